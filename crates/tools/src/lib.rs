//! 置換表の計測・負荷試験ツール群の共通部分

pub mod common;
