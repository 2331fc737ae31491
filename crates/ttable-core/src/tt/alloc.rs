//! 置換表用の生メモリ確保
//!
//! 数GBになり得るため、Linux では 2MB 境界に揃えて `MADV_HUGEPAGE` を付け、
//! Windows では権限があれば `MEM_LARGE_PAGES` で確保する。
//! 確保に失敗した場合は abort せず `TtError::AllocationFailed` を返す。

use std::ptr::NonNull;

#[cfg(not(windows))]
use std::alloc::{Layout, alloc, dealloc};
#[cfg(not(windows))]
use std::cmp::max;

#[cfg(windows)]
use windows_sys::Win32::Foundation::{CloseHandle, ERROR_SUCCESS, GetLastError};
#[cfg(windows)]
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LUID, LUID_AND_ATTRIBUTES, LookupPrivilegeValueA, OpenProcessToken,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
#[cfg(windows)]
use windows_sys::Win32::System::Memory::{
    GetLargePageMinimum, MEM_COMMIT, MEM_LARGE_PAGES, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
    VirtualAlloc, VirtualFree,
};
#[cfg(windows)]
use windows_sys::Win32::System::Threading::GetCurrentProcess;

use super::TtError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum AllocKind {
    LargePages,
    /// Large Pages 確保失敗時のフォールバック、
    /// または macOS 等の Large Pages 未対応環境・無効化設定で使用
    Regular,
}

/// 置換表が所有する生メモリ（未初期化）
///
/// 中身の初期化は呼び出し側の責任。
pub(super) struct Allocation {
    ptr: NonNull<u8>,
    kind: AllocKind,
    #[cfg(not(windows))]
    layout: Layout,
}

impl Allocation {
    pub(super) fn allocate(
        size: usize,
        alignment: usize,
        large_pages: bool,
    ) -> Result<Self, TtError> {
        #[cfg(windows)]
        {
            let _ = alignment;
            if large_pages {
                if let Some(alloc) = try_alloc_large_pages(size) {
                    return Ok(alloc);
                }
                log::warn!("TT: large pages unavailable, falling back to regular pages");
            }
            alloc_windows(size)
        }

        #[cfg(not(windows))]
        {
            alloc_unix(size, alignment, large_pages)
        }
    }

    pub(super) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(super) fn kind(&self) -> AllocKind {
        self.kind
    }
}

#[cfg(windows)]
fn align_up(value: usize, align: usize) -> Option<usize> {
    Some(value.checked_add(align - 1)? / align * align)
}

#[cfg(windows)]
fn try_alloc_large_pages(size: usize) -> Option<Allocation> {
    unsafe {
        let large_page_size = GetLargePageMinimum();
        if large_page_size == 0 {
            return None;
        }

        let mut token = std::ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut token)
            == 0
        {
            return None;
        }

        let mut luid = LUID {
            LowPart: 0,
            HighPart: 0,
        };
        if LookupPrivilegeValueA(std::ptr::null(), c"SeLockMemoryPrivilege".as_ptr().cast(), &mut luid)
            == 0
        {
            CloseHandle(token);
            return None;
        }

        let mut tp = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };
        let mut prev_tp = TOKEN_PRIVILEGES {
            PrivilegeCount: 0,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: LUID {
                    LowPart: 0,
                    HighPart: 0,
                },
                Attributes: 0,
            }],
        };
        let mut prev_len = std::mem::size_of::<TOKEN_PRIVILEGES>() as u32;

        // AdjustTokenPrivileges が非ゼロを返しても ERROR_SUCCESS でない場合は
        // 部分的な失敗（ERROR_NOT_ALL_ASSIGNED等）を意味するためチェック
        if AdjustTokenPrivileges(token, 0, &tp, prev_len, &mut prev_tp, &mut prev_len) == 0
            || GetLastError() != ERROR_SUCCESS
        {
            CloseHandle(token);
            return None;
        }

        let Some(alloc_size) = align_up(size, large_page_size) else {
            CloseHandle(token);
            return None;
        };
        let ptr = VirtualAlloc(
            std::ptr::null(),
            alloc_size,
            MEM_RESERVE | MEM_COMMIT | MEM_LARGE_PAGES,
            PAGE_READWRITE,
        );

        tp = prev_tp;
        AdjustTokenPrivileges(token, 0, &tp, 0, std::ptr::null_mut(), std::ptr::null_mut());
        CloseHandle(token);

        let ptr = NonNull::new(ptr as *mut u8)?;
        Some(Allocation {
            ptr,
            kind: AllocKind::LargePages,
        })
    }
}

#[cfg(windows)]
fn alloc_windows(size: usize) -> Result<Allocation, TtError> {
    let ptr = unsafe {
        VirtualAlloc(std::ptr::null(), size, MEM_RESERVE | MEM_COMMIT, PAGE_READWRITE)
    };
    let ptr = NonNull::new(ptr as *mut u8).ok_or(TtError::AllocationFailed { bytes: size })?;
    Ok(Allocation {
        ptr,
        kind: AllocKind::Regular,
    })
}

#[cfg(not(windows))]
fn alloc_unix(size: usize, alignment: usize, large_pages: bool) -> Result<Allocation, TtError> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let (page_align, kind) = if large_pages {
        (2 * 1024 * 1024, AllocKind::LargePages)
    } else {
        (4096, AllocKind::Regular)
    };
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let (page_align, kind) = {
        let _ = large_pages;
        (4096, AllocKind::Regular)
    };

    let alignment = max(alignment, page_align);
    let layout = Layout::from_size_align(size, alignment)
        .map_err(|_| TtError::AllocationFailed { bytes: size })?
        .pad_to_align();
    if layout.size() == 0 {
        return Err(TtError::ZeroSize);
    }

    // SAFETY: layout のサイズは 0 ではない
    let ptr = unsafe { alloc(layout) };
    let ptr = NonNull::new(ptr).ok_or(TtError::AllocationFailed {
        bytes: layout.size(),
    })?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    if kind == AllocKind::LargePages {
        // SAFETY: ptr は layout.size() バイトの確保済み領域の先頭
        let result =
            unsafe { libc::madvise(ptr.as_ptr().cast(), layout.size(), libc::MADV_HUGEPAGE) };
        // madvise失敗は動作に影響しないが、パフォーマンスに影響する可能性がある
        if result != 0 {
            log::warn!("TT: madvise(MADV_HUGEPAGE) failed, continuing with regular pages");
        }
    }

    Ok(Allocation { ptr, kind, layout })
}

impl Drop for Allocation {
    fn drop(&mut self) {
        unsafe {
            #[cfg(windows)]
            {
                let ok = VirtualFree(self.ptr.as_ptr().cast(), 0, MEM_RELEASE);
                if ok == 0 {
                    // リソースリークの可能性があるため、リリースビルドでも警告を出力
                    log::warn!("TT: VirtualFree failed with error {}", GetLastError());
                    debug_assert!(false, "VirtualFree failed");
                }
            }
            #[cfg(not(windows))]
            {
                dealloc(self.ptr.as_ptr(), self.layout);
            }
        }
    }
}

// SAFETY: Allocation は置換表のための生メモリを所有するだけで、
// 中身へのアクセスは上位（アトミックなエントリ）で同期される。
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}
