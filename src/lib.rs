//! mish ライブラリ — ジョブ制御付きの対話型 POSIX シェル。
//!
//! バイナリ本体は `main.rs` の REPL ループ。この `lib.rs` は
//! `benches/bench_main.rs` 等の外部クレートからパーサー・ジョブテーブルに
//! 直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | 構文解析（パイプライン、リダイレクト、クォート、`&`） |
//! | [`builtins`] | ビルトイン（`cd`, `exit`, `jobs`, `fg`, `bg`） |
//! | [`executor`] | パイプライン起動（パイプ作成、spawn ループ、fg/bg 振り分け） |
//! | [`spawn`] | fork + execvp ラッパー（子側のグループ設定・fd 配線・リダイレクト） |
//! | [`job`] | ジョブテーブル、フォアグラウンド待機、reap、ターミナル制御 |
//! | [`signals`] | シェルのシグナル設定と SIGCHLD フラグ |
//! | [`shell`] | シェルのプロセス全体状態（pgid、ターミナル、ジョブテーブル） |
//! | [`report`] | `perror(3)` 互換の診断出力 |

pub mod builtins;
pub mod executor;
pub mod job;
pub mod parser;
pub mod report;
pub mod shell;
pub mod signals;
pub mod spawn;
