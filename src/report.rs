//! 診断出力: `perror(3)` 互換のエラー報告。
//!
//! パース・ビルトイン・システムコールの失敗はすべてここを経由して
//! 一度だけユーザに報告される。リトライは行わない。

use std::ffi::CStr;
use std::io;

/// errno に対応するエラーメッセージ文字列を返す。
pub fn strerror(errno: i32) -> String {
    unsafe {
        let p = libc::strerror(errno);
        if p.is_null() {
            return format!("errno {}", errno);
        }
        CStr::from_ptr(p).to_string_lossy().into_owned()
    }
}

/// 直前のシステムコール失敗を `名前: メッセージ` 形式で stderr に報告する。
///
/// errno を参照するため、失敗したシステムコールの直後に呼ぶこと。
pub fn perror(what: &str) {
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    eprintln!("{}: {}", what, strerror(errno));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strerror_known_errno() {
        // ENOENT は POSIX で固定のメッセージを持つ
        assert_eq!(strerror(libc::ENOENT), "No such file or directory");
    }

    #[test]
    fn strerror_unknown_errno() {
        // glibc は未知の errno にも "Unknown error ..." を返すため空にはならない
        assert!(!strerror(99999).is_empty());
    }
}
