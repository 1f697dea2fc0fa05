//! mish — ジョブ制御付きの対話型 POSIX シェル
//!
//! REPL ループ: 状態変化の reap → 完了通知 → プロンプト表示 → 入力読み取り
//! → パース → ビルトイン判定 → パイプライン起動 → ループ
//!
//! 機能:
//! - 構文解析: パイプライン、リダイレクト、クォート、`&`（[`mish::parser`]）
//! - パイプライン起動: パイプ接続、プロセスグループ管理（[`mish::executor`]）
//! - ビルトイン: `cd`, `exit`, `jobs`, `fg`, `bg`（[`mish::builtins`]）
//! - ジョブ制御: バックグラウンド実行 (`&`)、Ctrl+Z サスペンド、
//!   `fg`/`bg` 復帰（[`mish::job`]）

use std::env;
use std::io::{self, BufRead, Write};

use mish::shell::Shell;
use mish::{builtins, executor, job, parser, signals};

fn main() {
    // シグナル設定: シェル自体は SIGINT/SIGTSTP/SIGTTOU/SIGTTIN を無視し、
    // SIGCHLD はフラグを立てるだけのハンドラを入れる。
    // 子プロセスは spawn 時に SIG_DFL へリセットされる。
    signals::install();

    // シェルを自身のプロセスグループリーダーにし、ターミナルを掌握して
    // 属性を保存する。
    let shell_pgid = unsafe { libc::getpid() };
    let mut tmodes: libc::termios = unsafe { std::mem::zeroed() };
    unsafe {
        libc::setpgid(shell_pgid, shell_pgid);
        libc::tcsetpgrp(libc::STDIN_FILENO, shell_pgid);
        libc::tcgetattr(libc::STDIN_FILENO, &mut tmodes);
    }

    let mut shell = Shell::new(shell_pgid, libc::STDIN_FILENO, tmodes);

    // stdin/stdout のロックを保持し、毎回のロック取得を避ける
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdin = stdin.lock();
    let mut stdout = stdout.lock();
    let mut line = String::new();

    loop {
        // SIGCHLD が来ていたら子の状態変化を reap し、Done を告知して削除する
        if signals::child_pending() {
            job::reap_pending(&mut shell.jobs);
        }
        shell.jobs.drain_done(|j| println!("[{}] Done\t{}", j.id, j.command));

        // プロンプト表示: カレントディレクトリが取れない場合は `$ ` のみ
        match env::current_dir() {
            Ok(cwd) => {
                let _ = write!(stdout, "{} $ ", cwd.display());
            }
            Err(_) => {
                let _ = write!(stdout, "$ ");
            }
        }
        let _ = stdout.flush();

        // バッファを再利用して読み取り
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                // EOF (Ctrl+D): 改行を出力して正常終了
                let _ = writeln!(stdout);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("read error: {}", e);
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parser::parse(trimmed) {
            Ok(Some(pipeline)) => {
                // 単一コマンドのビルトインはシェルプロセス内で実行する
                if pipeline.commands.len() == 1
                    && builtins::try_exec(&mut shell, &pipeline.commands[0])
                {
                    if shell.should_exit {
                        break;
                    }
                    continue;
                }
                executor::launch(&mut shell, &pipeline, trimmed);
            }
            Ok(None) => {}
            Err(e) => eprintln!("Parse error: {}", e),
        }
    }
}
