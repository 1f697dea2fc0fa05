//! ジョブテーブルとジョブ制御ヘルパー。
//!
//! フォアグラウンド待機 ([`wait_for_fg`])、ノンブロッキング reap
//! ([`reap_pending`])、完了通知 ([`JobTable::drain_done`])、ターミナル制御
//! ([`give_terminal_to`] / [`take_terminal_back`]) を提供する。
//! executor と builtins の両方から利用し、循環依存を回避する。

use libc::pid_t;

use crate::report;

// ── データ構造 ───────────────────────────────────────────────────────

/// ジョブ内の個別プロセス。パイプライン中の各コマンドに対応する。
pub struct JobProcess {
    /// プロセス ID。
    pub pid: pid_t,
    /// 正常終了またはシグナルで終了した場合に `true`。
    pub completed: bool,
    /// SIGTSTP 等で停止中の場合に `true`。
    pub stopped: bool,
}

/// ジョブの集約状態。個別プロセスの状態から導出される。
///
/// 判定優先度: Stopped > Done > Running。パイプラインの一部だけが
/// 停止した場合もジョブ全体を Stopped として扱う。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobState {
    /// 少なくとも 1 つのプロセスが実行中で、停止プロセスがない。
    Running,
    /// 少なくとも 1 つのプロセスが停止中。
    Stopped,
    /// 全プロセスが終了済み。
    Done,
}

/// ジョブ。起動された 1 本のパイプライン（= 1 プロセスグループ）に対応する。
///
/// フォアグラウンド・バックグラウンドを問わず起動直後にテーブルへ登録され、
/// Done の通知が済んだ時点で削除される。`jobs` / `fg` / `bg` ビルトインから
/// ジョブ ID で参照される。
pub struct Job {
    /// `[N]` 形式で表示されるジョブ番号。セッション内で単調増加し再利用しない。
    pub id: usize,
    /// プロセスグループ ID。`kill(-pgid, sig)` や `waitpid(-pgid, ...)` で使用。
    pub pgid: pid_t,
    /// 表示用コマンド文字列（入力行を trim したもの）。
    pub command: String,
    /// パイプライン内の各プロセス。
    pub processes: Vec<JobProcess>,
}

impl Job {
    /// ジョブの現在の状態を返す。
    pub fn state(&self) -> JobState {
        if self.processes.iter().any(|p| p.stopped) {
            return JobState::Stopped;
        }
        if self.processes.iter().all(|p| p.completed) {
            return JobState::Done;
        }
        JobState::Running
    }

    /// ジョブの状態表示文字列を返す。
    pub fn state_str(&self) -> &'static str {
        match self.state() {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        }
    }

    /// 全プロセスの停止マークを外す。SIGCONT 送信時に呼ぶ。
    pub fn mark_running(&mut self) {
        for proc in &mut self.processes {
            proc.stopped = false;
        }
    }
}

// ── JobTable ─────────────────────────────────────────────────────────

/// ジョブテーブル。ジョブの追加・検索・状態更新・削除を管理する。
///
/// [`Shell`](crate::shell::Shell) が所有し、executor と builtins の
/// 両方からアクセスされる。テーブルの並び順 = ID の昇順。
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// ジョブを追加し、割り当てた ID を返す。ID は単調増加で再利用しない。
    pub fn insert(&mut self, pgid: pid_t, command: String, pids: Vec<pid_t>) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        let processes = pids
            .into_iter()
            .map(|pid| JobProcess {
                pid,
                completed: false,
                stopped: false,
            })
            .collect();

        self.jobs.push(Job {
            id,
            pgid,
            command,
            processes,
        });
        id
    }

    /// ID でジョブを検索する。
    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// ID でジョブを検索する（可変参照）。
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    /// プロセスグループ ID でジョブを検索する。
    pub fn find_by_pgid(&self, pgid: pid_t) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pgid == pgid)
    }

    /// `waitpid` の結果でプロセスの状態を更新する。
    ///
    /// - `WIFSTOPPED` → 停止
    /// - `WIFCONTINUED` → 停止解除
    /// - それ以外（正常終了・シグナル終了） → 完了
    ///
    /// 該当 PID がテーブルに存在しない場合は何もしない
    /// （起動を断念したパイプラインの子など）。
    pub fn mark_pid(&mut self, pid: pid_t, raw_status: i32) {
        for job in &mut self.jobs {
            for proc in &mut job.processes {
                if proc.pid == pid {
                    if libc::WIFSTOPPED(raw_status) {
                        proc.stopped = true;
                    } else if libc::WIFCONTINUED(raw_status) {
                        proc.stopped = false;
                    } else {
                        proc.completed = true;
                        proc.stopped = false;
                    }
                    return;
                }
            }
        }
    }

    /// Done のジョブを ID 昇順に `emit` へ渡してからテーブルから削除する。
    ///
    /// プロンプト表示前と `jobs` ビルトインから呼ばれる。削除までが一体なので
    /// 1 つのジョブにつき通知はちょうど 1 回になる。
    pub fn drain_done(&mut self, mut emit: impl FnMut(&Job)) {
        for job in &self.jobs {
            if job.state() == JobState::Done {
                emit(job);
            }
        }
        self.jobs.retain(|j| j.state() != JobState::Done);
    }

    /// 全ジョブのイテレータ（ID 昇順）。
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}

// ── 待機・reap ヘルパー ──────────────────────────────────────────────

/// フォアグラウンドジョブを待機する。停止で終わったら `true` を返す。
///
/// `waitpid(-pgid, WUNTRACED)` をループし、各プロセスの状態を
/// [`JobTable::mark_pid`] で反映しながら、ジョブの導出状態が
/// Done または Stopped になるまでブロックする。一部のプロセスが
/// 停止した時点で残りが実行中でもジョブは Stopped として扱う。
pub fn wait_for_fg(jobs: &mut JobTable, pgid: pid_t) -> bool {
    loop {
        let mut raw_status: i32 = 0;
        let pid = unsafe { libc::waitpid(-pgid, &mut raw_status, libc::WUNTRACED) };

        if pid <= 0 {
            // ECHILD: グループの子はすべて reap 済み
            return false;
        }

        jobs.mark_pid(pid, raw_status);

        match jobs.find_by_pgid(pgid).map(Job::state) {
            Some(JobState::Done) | None => return false,
            Some(JobState::Stopped) => return true,
            Some(JobState::Running) => continue,
        }
    }
}

/// 非ブロッキングで子プロセスの状態変化を reap する。
///
/// `waitpid(-1, WNOHANG | WUNTRACED | WCONTINUED)` を reap できる
/// プロセスがなくなるまで繰り返し、各状態をジョブテーブルに反映する。
/// SIGCHLD フラグが立っていた場合に REPL 先頭と `jobs` ビルトインから呼ばれる。
pub fn reap_pending(jobs: &mut JobTable) {
    loop {
        let mut raw_status: i32 = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid <= 0 {
            break;
        }

        jobs.mark_pid(pid, raw_status);
    }
}

// ── ターミナル制御ヘルパー ───────────────────────────────────────────

/// `tcsetpgrp` でターミナルのフォアグラウンドプロセスグループを `pgid` に設定する。
///
/// シェルが SIGTTOU を無視しているため、非オーナー状態からの呼び出しでも停止しない。
pub fn give_terminal_to(terminal_fd: i32, pgid: pid_t) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, pgid);
    }
}

/// ターミナルの所有権をシェルに戻し、起動時に保存した属性を復元する。
///
/// フォアグラウンドジョブの完了後・停止後、次のプロンプト表示より前に必ず呼ぶ。
pub fn take_terminal_back(terminal_fd: i32, shell_pgid: pid_t, tmodes: &libc::termios) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, shell_pgid);
        libc::tcsetattr(terminal_fd, libc::TCSADRAIN, tmodes);
    }
}

// ── フォアグラウンド / バックグラウンド遷移 ──────────────────────────

/// ジョブをフォアグラウンドに置き、Done または Stopped になるまで待機する。
///
/// 新規起動時は `cont = false`、`fg` ビルトインからの再開時は `cont = true`
/// で呼ぶ。再開時は `SIGCONT` をグループ全体へ送ってから待機する。
/// 待機がどう終わってもターミナルはシェルへ返す。
pub fn put_in_foreground(
    jobs: &mut JobTable,
    terminal_fd: i32,
    shell_pgid: pid_t,
    tmodes: &libc::termios,
    id: usize,
    cont: bool,
) {
    let pgid = match jobs.get(id) {
        Some(job) => job.pgid,
        None => return,
    };

    give_terminal_to(terminal_fd, pgid);

    if cont {
        if unsafe { libc::kill(-pgid, libc::SIGCONT) } < 0 {
            report::perror("kill (SIGCONT)");
        }
        if let Some(job) = jobs.get_mut(id) {
            job.mark_running();
        }
    }

    let stopped = wait_for_fg(jobs, pgid);

    take_terminal_back(terminal_fd, shell_pgid, tmodes);

    if stopped {
        if let Some(job) = jobs.get(id) {
            println!("\n[{}] Stopped\t{}", job.id, job.command);
        }
    }
}

/// 停止中のジョブをバックグラウンドで再開する。
///
/// `SIGCONT` をグループ全体へ送り、Running にマークして
/// `[N] pgid コマンド` 形式で告知する。ターミナルは渡さない。
pub fn put_in_background(jobs: &mut JobTable, id: usize) {
    let job = match jobs.get_mut(id) {
        Some(job) => job,
        None => return,
    };

    if unsafe { libc::kill(-job.pgid, libc::SIGCONT) } < 0 {
        report::perror("kill (SIGCONT)");
    }
    job.mark_running();
    println!("[{}] {} {}", job.id, job.pgid, job.command);
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Linux の wait ステータス語を組み立てる（man 2 waitpid のエンコーディング）
    fn exited(code: i32) -> i32 {
        (code & 0xff) << 8
    }
    fn signaled(sig: i32) -> i32 {
        sig
    }
    fn stopped(sig: i32) -> i32 {
        (sig << 8) | 0x7f
    }
    const CONTINUED: i32 = 0xffff;

    #[test]
    fn raw_status_encoding_matches_libc() {
        assert!(libc::WIFEXITED(exited(0)));
        assert_eq!(libc::WEXITSTATUS(exited(127)), 127);
        assert!(libc::WIFSIGNALED(signaled(libc::SIGINT)));
        assert!(libc::WIFSTOPPED(stopped(libc::SIGTSTP)));
        assert!(libc::WIFCONTINUED(CONTINUED));
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut table = JobTable::new();
        let a = table.insert(100, "sleep 1".into(), vec![100]);
        let b = table.insert(200, "sleep 2".into(), vec![200]);
        assert_eq!((a, b), (1, 2));

        // ジョブを完了・削除しても ID は戻らない
        table.mark_pid(100, exited(0));
        table.drain_done(|_| {});
        let c = table.insert(300, "sleep 3".into(), vec![300]);
        assert_eq!(c, 3);
    }

    #[test]
    fn lookup_by_id_and_pgid() {
        let mut table = JobTable::new();
        let id = table.insert(42, "cat".into(), vec![42]);
        assert_eq!(table.get(id).unwrap().pgid, 42);
        assert_eq!(table.find_by_pgid(42).unwrap().id, id);
        assert!(table.get(99).is_none());
        assert!(table.find_by_pgid(99).is_none());
    }

    #[test]
    fn pipeline_is_done_only_when_all_members_exit() {
        let mut table = JobTable::new();
        let id = table.insert(10, "false | true".into(), vec![10, 11]);

        table.mark_pid(10, exited(1));
        assert_eq!(table.get(id).unwrap().state(), JobState::Running);

        table.mark_pid(11, exited(0));
        assert_eq!(table.get(id).unwrap().state(), JobState::Done);
    }

    #[test]
    fn any_stopped_member_stops_the_job() {
        let mut table = JobTable::new();
        let id = table.insert(20, "cat | sort".into(), vec![20, 21]);

        table.mark_pid(20, exited(0));
        table.mark_pid(21, stopped(libc::SIGTSTP));
        assert_eq!(table.get(id).unwrap().state(), JobState::Stopped);
        assert_eq!(table.get(id).unwrap().state_str(), "Stopped");
    }

    #[test]
    fn continued_clears_stop() {
        let mut table = JobTable::new();
        let id = table.insert(30, "sleep 60".into(), vec![30]);

        table.mark_pid(30, stopped(libc::SIGTSTP));
        assert_eq!(table.get(id).unwrap().state(), JobState::Stopped);

        table.mark_pid(30, CONTINUED);
        assert_eq!(table.get(id).unwrap().state(), JobState::Running);
    }

    #[test]
    fn signal_death_counts_as_done() {
        let mut table = JobTable::new();
        let id = table.insert(40, "sleep 60".into(), vec![40]);
        table.mark_pid(40, signaled(libc::SIGINT));
        assert_eq!(table.get(id).unwrap().state(), JobState::Done);
    }

    #[test]
    fn unknown_pid_is_ignored() {
        let mut table = JobTable::new();
        let id = table.insert(50, "cat".into(), vec![50]);
        table.mark_pid(9999, exited(0));
        assert_eq!(table.get(id).unwrap().state(), JobState::Running);
    }

    #[test]
    fn drain_emits_in_id_order_and_removes() {
        let mut table = JobTable::new();
        table.insert(60, "a".into(), vec![60]);
        table.insert(61, "b".into(), vec![61]);
        table.insert(62, "c".into(), vec![62]);

        // 完了順は逆でも通知は ID 昇順
        table.mark_pid(62, exited(0));
        table.mark_pid(60, exited(0));

        let mut emitted = Vec::new();
        table.drain_done(|j| emitted.push(j.id));
        assert_eq!(emitted, vec![1, 3]);

        // 残るのは Running の 1 件のみ
        assert_eq!(table.iter().count(), 1);
        assert_eq!(table.iter().next().unwrap().id, 2);
    }

    #[test]
    fn drain_is_idempotent() {
        let mut table = JobTable::new();
        table.insert(70, "a".into(), vec![70]);
        table.mark_pid(70, exited(0));

        let mut count = 0;
        table.drain_done(|_| count += 1);
        table.drain_done(|_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn mark_running_clears_all_stop_marks() {
        let mut table = JobTable::new();
        let id = table.insert(80, "cat | sort".into(), vec![80, 81]);
        table.mark_pid(80, stopped(libc::SIGTSTP));
        table.mark_pid(81, stopped(libc::SIGTSTP));

        table.get_mut(id).unwrap().mark_running();
        assert_eq!(table.get(id).unwrap().state(), JobState::Running);
    }
}
