//! シェル本体のシグナル設定と SIGCHLD フラグ。
//!
//! - SIGINT / SIGTSTP: シェル自身は無視する。ターミナルがフォアグラウンド
//!   プロセスグループへ直接配送するため、シェルが転送する必要はない。
//! - SIGTTOU / SIGTTIN: 無視する。ターミナル所有権の移譲
//!   （`tcsetpgrp`）を非オーナー状態から呼んでも停止しないようにする。
//! - SIGCHLD: ハンドラはフラグを立てるだけ。reap とジョブテーブルの更新は
//!   すべて REPL 側（[`crate::job::reap_pending`]）で行う。
//!
//! 子プロセスは [`crate::spawn`] がこれらをすべて `SIG_DFL` に戻す。

use std::sync::atomic::{AtomicBool, Ordering};

/// SIGCHLD 受信フラグ。非同期コンテキストから書かれる唯一の変数。
static CHILD_PENDING: AtomicBool = AtomicBool::new(false);

/// SIGCHLD ハンドラ。async-signal-safe にするためフラグ書き込み以外を行わない。
extern "C" fn on_sigchld(_sig: libc::c_int) {
    CHILD_PENDING.store(true, Ordering::Relaxed);
}

/// シェル起動時のシグナル設定を行う。
pub fn install() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
        libc::signal(libc::SIGTSTP, libc::SIG_IGN);
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
        libc::signal(libc::SIGTTIN, libc::SIG_IGN);

        let handler = on_sigchld as extern "C" fn(libc::c_int);
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handler as libc::sighandler_t;
        libc::sigemptyset(&mut sa.sa_mask);
        sa.sa_flags = libc::SA_RESTART;
        libc::sigaction(libc::SIGCHLD, &sa, std::ptr::null_mut());
    }
}

/// SIGCHLD フラグを読み取り、同時にクリアする。
///
/// `true` が返ったら前回の呼び出し以降に子プロセスの状態変化があったので、
/// 呼び出し側は [`crate::job::reap_pending`] で reap する。
pub fn child_pending() -> bool {
    CHILD_PENDING.swap(false, Ordering::Relaxed)
}
