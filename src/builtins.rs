//! ビルトインコマンドの実装。
//!
//! `cd` / `exit` / `fg` / `bg` は fork するとプロセス状態の変更が子に
//! 閉じてしまうため、必ずシェル本体のプロセス内で実行する。`jobs` も
//! 同じ経路で処理する。単一コマンドのパイプラインだけが対象で、
//! リダイレクト指定とバックグラウンドフラグは適用しない。

use std::env;

use crate::job;
use crate::parser::Command;
use crate::report;
use crate::shell::Shell;

/// ビルトインコマンドの実行を試みる。
///
/// 戻り値:
/// - `true` — ビルトインとして処理済み
/// - `false` — 該当するビルトインなし（パイプラインとして起動すべき）
pub fn try_exec(shell: &mut Shell, cmd: &Command<'_>) -> bool {
    let args: Vec<&str> = cmd.args.iter().map(|a| a.as_ref()).collect();
    match args.first() {
        Some(&"cd") => builtin_cd(&args),
        Some(&"exit") => shell.should_exit = true,
        Some(&"jobs") => builtin_jobs(shell),
        Some(&"fg") => builtin_fg(shell, &args),
        Some(&"bg") => builtin_bg(shell, &args),
        _ => return false,
    }
    true
}

/// `cd [dir]` — カレントディレクトリを変更する。
/// 引数省略時は `$HOME`、それも未設定なら `/` に移動する。
fn builtin_cd(args: &[&str]) {
    let target = match args.get(1) {
        Some(path) => path.to_string(),
        None => env::var("HOME").unwrap_or_else(|_| String::from("/")),
    };
    if let Err(e) = env::set_current_dir(&target) {
        eprintln!("cd: {}", report::strerror(e.raw_os_error().unwrap_or(0)));
    }
}

/// `jobs` — 溜まっている状態変化を reap し、完了ジョブを告知・削除してから
/// 残りのジョブを ID 順に表示する。
///
/// 完了ジョブの告知はここか REPL 先頭の drain のどちらか一方でちょうど
/// 1 回行われ、告知済みのジョブはテーブルに残らない。
fn builtin_jobs(shell: &mut Shell) {
    job::reap_pending(&mut shell.jobs);
    shell
        .jobs
        .drain_done(|j| println!("[{}] Done\t{}", j.id, j.command));
    for j in shell.jobs.iter() {
        println!("[{}] {}\t{}", j.id, j.state_str(), j.command);
    }
}

/// `fg %id` / `fg id` — ジョブをフォアグラウンドで再開する。
fn builtin_fg(shell: &mut Shell, args: &[&str]) {
    let id = match args.get(1).and_then(|a| parse_jobspec(a)) {
        Some(id) => id,
        None => {
            eprintln!("fg: usage: fg %jobid");
            return;
        }
    };
    if shell.jobs.get(id).is_none() {
        eprintln!("fg: no such job");
        return;
    }
    job::put_in_foreground(
        &mut shell.jobs,
        shell.terminal_fd,
        shell.shell_pgid,
        &shell.tmodes,
        id,
        true,
    );
}

/// `bg %id` / `bg id` — 停止中のジョブをバックグラウンドで再開する。
fn builtin_bg(shell: &mut Shell, args: &[&str]) {
    let id = match args.get(1).and_then(|a| parse_jobspec(a)) {
        Some(id) => id,
        None => {
            eprintln!("bg: usage: bg %jobid");
            return;
        }
    };
    if shell.jobs.get(id).is_none() {
        eprintln!("bg: no such job");
        return;
    }
    job::put_in_background(&mut shell.jobs, id);
}

/// ジョブ指定（`%3` または `3`）をジョブ ID にパースする。
fn parse_jobspec(arg: &str) -> Option<usize> {
    let digits = arg.strip_prefix('%').unwrap_or(arg);
    digits.parse().ok()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn jobspec_accepts_percent_and_bare_id() {
        assert_eq!(parse_jobspec("%3"), Some(3));
        assert_eq!(parse_jobspec("7"), Some(7));
    }

    #[test]
    fn jobspec_rejects_garbage() {
        assert_eq!(parse_jobspec(""), None);
        assert_eq!(parse_jobspec("%"), None);
        assert_eq!(parse_jobspec("%x"), None);
        assert_eq!(parse_jobspec("1a"), None);
        assert_eq!(parse_jobspec("-1"), None);
    }

    #[test]
    fn cd_changes_directory() {
        let saved = env::current_dir().unwrap();
        builtin_cd(&["cd", "/"]);
        assert_eq!(env::current_dir().unwrap(), PathBuf::from("/"));
        env::set_current_dir(saved).unwrap();
    }
}
