//! シェルのプロセス全体状態を保持するモジュール。

use crate::job::JobTable;

/// シェルの実行状態。起動時に初期化され、REPL ループ全体で共有される。
pub struct Shell {
    /// シェル自身のプロセスグループ ID。アイドル時のターミナル所有者。
    pub shell_pgid: libc::pid_t,
    /// 制御ターミナルのファイルディスクリプタ（正準的には STDIN）。
    pub terminal_fd: i32,
    /// 起動時に保存したターミナル属性。フォアグラウンド待機後の復元に使う。
    pub tmodes: libc::termios,
    /// ジョブテーブル。
    pub jobs: JobTable,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
}

impl Shell {
    pub fn new(shell_pgid: libc::pid_t, terminal_fd: i32, tmodes: libc::termios) -> Self {
        Self {
            shell_pgid,
            terminal_fd,
            tmodes,
            jobs: JobTable::new(),
            should_exit: false,
        }
    }
}
