//! `fork()` + `execvp()` の安全な Rust ラッパー。
//!
//! パイプライン 1 段ぶんの子プロセスを起動する。fork 後の子プロセスでは
//! アロケーションを避けるため、argv・リダイレクトパスの C 文字列は
//! fork 前にすべて構築しておく。
//!
//! ## 子プロセス側の処理順
//!
//! 1. `setpgid(0, pgid)` — pgid が 0 なら自分の PID で新グループを作る
//! 2. SIGINT / SIGTSTP / SIGCHLD / SIGTTIN / SIGTTOU を `SIG_DFL` に戻す
//! 3. パイプの fd を stdin / stdout へ `dup2`
//! 4. ファイルリダイレクトを開いて `dup2`（パイプ接続より後に適用し、
//!    同じ側ではファイルが優先される）
//! 5. `execvp` — 失敗時は `execvp: ...` を表示して `_exit(127)`
//!
//! 親プロセス側でも `setpgid(pid, pgid)` を重ねて呼び、どちらが先に
//! 走ってもグループが確定しているようにする（EACCES は無視）。

use std::borrow::Cow;
use std::ffi::CString;
use std::fmt;
use std::io;

use crate::parser::Command;
use crate::report;

// ── エラー型 ──────────────────────────────────────────────────────

/// `fork` の失敗を表すエラー。exec の失敗は子プロセス内で報告される。
#[derive(Debug)]
pub struct SpawnError {
    /// errno 値。
    pub errno: i32,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fork: {}", report::strerror(self.errno))
    }
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。各要素を `CString` に変換し、NULL 終端
    /// ポインタ配列を作る。NUL を含む引数は空文字列に落とす。
    fn from_args(args: &[Cow<'_, str>]) -> Self {
        let strings: Vec<CString> = args
            .iter()
            .map(|s| {
                CString::new(s.as_ref()).unwrap_or_else(|_| CString::new("").unwrap())
            })
            .collect();
        let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null()); // NULL 終端
        Self {
            _strings: strings,
            ptrs,
        }
    }

    fn is_empty(&self) -> bool {
        self._strings.is_empty()
    }

    /// argv[0]（コマンド名）のポインタ。空 argv で呼んではならない。
    fn arg0(&self) -> *const libc::c_char {
        self.ptrs[0]
    }

    /// NULL 終端ポインタ配列を返す。
    fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

/// パスを CString に変換する。NUL を含むパスは空文字列に落とし、
/// open の失敗として報告させる。
fn path_cstring(path: &str) -> CString {
    CString::new(path).unwrap_or_else(|_| CString::new("").unwrap())
}

// ── spawn 関数 ────────────────────────────────────────────────────

/// パイプライン 1 段の子プロセスを fork + exec で起動する。成功時は子 PID を返す。
///
/// - `cmd`: 引数列とファイルリダイレクト指定
/// - `pgid`: パイプラインのプロセスグループ（0 なら子 PID をリーダーにする）
/// - `stdin_fd`: stdin に接続するパイプ fd（`None` ならシェルの stdin を継承）
/// - `stdout_fd`: stdout に接続するパイプ fd（`None` ならシェルの stdout を継承）
/// - `fds_to_close`: 子プロセスで閉じる fd（自パイプの read 端など）
///
/// argv が空（リダイレクトのみのコマンド）の場合、子はリダイレクトの
/// 適用だけを行って status 0 で終了する。
pub fn spawn(
    cmd: &Command<'_>,
    pgid: libc::pid_t,
    stdin_fd: Option<i32>,
    stdout_fd: Option<i32>,
    fds_to_close: &[i32],
) -> Result<libc::pid_t, SpawnError> {
    // fork 後の子でヒープを触らないよう、C 文字列は先に作る
    let argv = CStringVec::from_args(&cmd.args);
    let infile = cmd.infile.as_deref().map(path_cstring);
    let outfile = cmd.outfile.as_deref().map(path_cstring);

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(SpawnError {
            errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
        });
    }

    if pid == 0 {
        // ── 子プロセス ──
        unsafe {
            let pgid = if pgid == 0 { libc::getpid() } else { pgid };
            libc::setpgid(0, pgid);

            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGTSTP, libc::SIG_DFL);
            libc::signal(libc::SIGCHLD, libc::SIG_DFL);
            libc::signal(libc::SIGTTIN, libc::SIG_DFL);
            libc::signal(libc::SIGTTOU, libc::SIG_DFL);

            if let Some(fd) = stdin_fd {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::close(fd);
            }
            if let Some(fd) = stdout_fd {
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::close(fd);
            }
            for &fd in fds_to_close {
                libc::close(fd);
            }

            // ファイルリダイレクトはパイプ接続の後に適用する
            if let Some(path) = &infile {
                let fd = libc::open(path.as_ptr(), libc::O_RDONLY);
                if fd < 0 {
                    report::perror("open infile");
                    libc::_exit(1);
                }
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::close(fd);
            }
            if let Some(path) = &outfile {
                let mode = if cmd.append {
                    libc::O_APPEND
                } else {
                    libc::O_TRUNC
                };
                let fd = libc::open(path.as_ptr(), libc::O_WRONLY | libc::O_CREAT | mode, 0o644);
                if fd < 0 {
                    report::perror("open outfile");
                    libc::_exit(1);
                }
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::close(fd);
            }

            if argv.is_empty() {
                // リダイレクトのみのコマンド: ファイル作成だけ行って正常終了
                libc::_exit(0);
            }

            libc::execvp(argv.arg0(), argv.as_ptr());
            report::perror("execvp");
            libc::_exit(127);
        }
    }

    // ── 親プロセス ──
    unsafe {
        // 子側の setpgid とのレースを塞ぐ重ね掛け。失敗（EACCES 等）は無視する。
        let group = if pgid == 0 { pid } else { pgid };
        libc::setpgid(pid, group);
    }

    Ok(pid)
}
