//! パイプライン起動: パイプ作成、子プロセスの spawn ループ、
//! ジョブ登録、フォアグラウンド / バックグラウンドの振り分け。
//!
//! ## 処理の流れ
//!
//! 1. コマンド i を spawn する直前に、次段への接続パイプを作る（最終段は不要）
//! 2. [`crate::spawn::spawn`] で子を起動。最初の子の PID がパイプラインの
//!    プロセスグループ ID になる
//! 3. 消費したパイプ fd を親側で即座に閉じる。write 端を持ち続けると
//!    reader が EOF を観測できない
//! 4. 全段 spawn 後にジョブテーブルへ登録し、
//!    foreground → ターミナルを渡して待機 / background → `[N] pgid cmd` を告知
//!
//! fork や pipe の失敗時は起動を断念し、作成済みの fd を閉じる。
//! 既に spawn された子はそのまま走らせ、通常の reap に任せる。
//! この場合ジョブは登録されない。

use crate::job;
use crate::parser::Pipeline;
use crate::report;
use crate::shell::Shell;
use crate::spawn;

/// パイプラインを起動し、フォアグラウンドなら完了または停止まで待機する。
///
/// `line` は trim 済みの入力行で、ジョブテーブルの表示用文字列になる。
pub fn launch(shell: &mut Shell, pipeline: &Pipeline<'_>, line: &str) {
    let n = pipeline.commands.len();

    // 次の子の stdin に接続する fd。初期値はシェルの stdin。
    let mut prev_read = libc::STDIN_FILENO;
    // パイプラインのプロセスグループ。最初の子の PID で確定する。
    let mut pgid: libc::pid_t = 0;
    let mut pids: Vec<libc::pid_t> = Vec::with_capacity(n);

    for (i, cmd) in pipeline.commands.iter().enumerate() {
        let last = i + 1 == n;

        // 次段への接続パイプ
        let mut cur_pipe = [-1i32; 2];
        if !last {
            if unsafe { libc::pipe(cur_pipe.as_mut_ptr()) } < 0 {
                report::perror("pipe");
                if prev_read != libc::STDIN_FILENO {
                    unsafe { libc::close(prev_read) };
                }
                return;
            }
        }

        let stdin_fd = if prev_read != libc::STDIN_FILENO {
            Some(prev_read)
        } else {
            None
        };
        let stdout_fd = if last { None } else { Some(cur_pipe[1]) };
        // 子が継承する自パイプの read 端は子側で閉じる
        let close_in_child: &[i32] = if last { &[] } else { &cur_pipe[..1] };

        match spawn::spawn(cmd, pgid, stdin_fd, stdout_fd, close_in_child) {
            Ok(pid) => {
                if pgid == 0 {
                    pgid = pid;
                }
                pids.push(pid);
            }
            Err(e) => {
                eprintln!("{}", e);
                if prev_read != libc::STDIN_FILENO {
                    unsafe { libc::close(prev_read) };
                }
                if !last {
                    unsafe {
                        libc::close(cur_pipe[0]);
                        libc::close(cur_pipe[1]);
                    }
                }
                return;
            }
        }

        // 消費済みの fd を親側で閉じる
        if prev_read != libc::STDIN_FILENO {
            unsafe { libc::close(prev_read) };
        }
        if !last {
            unsafe { libc::close(cur_pipe[1]) };
        }

        prev_read = if last { libc::STDIN_FILENO } else { cur_pipe[0] };
    }

    let id = shell.jobs.insert(pgid, line.to_string(), pids);

    if pipeline.background {
        if let Some(job) = shell.jobs.get(id) {
            println!("[{}] {} {}", job.id, job.pgid, job.command);
        }
    } else {
        job::put_in_foreground(
            &mut shell.jobs,
            shell.terminal_fd,
            shell.shell_pgid,
            &shell.tmodes,
            id,
            false,
        );
    }
}
