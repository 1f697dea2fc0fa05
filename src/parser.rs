//! トークナイザ + パーサー: 入力行からパイプライン AST を構築する。
//!
//! 手書きトークナイザでゼロコピー（[`Cow::Borrowed`]）のトークン列を生成し、
//! ループベースのパーサーで [`Pipeline`] AST に変換する。
//!
//! ## 対応構文
//!
//! - パイプライン: `cmd1 | cmd2 | cmd3`
//! - リダイレクト: `<`, `>`, `>>`（同方向の後勝ち）
//! - クォート: シングル (`'...'`) / ダブル (`"..."`)。ワード途中でも
//!   開始でき、閉じた後も同じワードに連結される（`a'b c'd` → `ab cd`）
//! - バックグラウンド指定: 行末の `&`
//!
//! ## 未対応
//!
//! エスケープ (`\"`, `\\`)、変数展開、コマンド置換、glob、
//! ヒアドキュメント、`&&` / `||` / `;`。

use std::borrow::Cow;
use std::fmt;

// ── AST ─────────────────────────────────────────────────────────────

/// パイプラインで接続されたコマンド列とバックグラウンドフラグ。
#[derive(Debug, PartialEq)]
pub struct Pipeline<'a> {
    pub commands: Vec<Command<'a>>,
    /// 行末に `&` があれば true。
    pub background: bool,
}

/// 単一コマンド。引数リストとリダイレクト指定を持つ。
///
/// `Cow<'a, str>` を採用: クォートなしトークンは `Borrowed`（ゼロコピー）、
/// クォートを含むワードは引用符を剥がした `Owned` になる。
/// リダイレクトは同方向の後勝ちなのでリストではなくスカラで持つ。
#[derive(Debug, Default, PartialEq)]
pub struct Command<'a> {
    pub args: Vec<Cow<'a, str>>,
    /// `< file` — stdin をファイルから読み取り。
    pub infile: Option<Cow<'a, str>>,
    /// `> file` / `>> file` — stdout をファイルへ。
    pub outfile: Option<Cow<'a, str>>,
    /// outfile への追記 (`>>`) なら true。
    pub append: bool,
}

impl fmt::Display for Command<'_> {
    /// 正準形: 引数列、`< in`、`> out` / `>> out` の順にスペース区切り。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        if let Some(path) = &self.infile {
            parts.push(format!("< {}", path));
        }
        if let Some(path) = &self.outfile {
            let op = if self.append { ">>" } else { ">" };
            parts.push(format!("{} {}", op, path));
        }
        f.write_str(&parts.join(" "))
    }
}

impl fmt::Display for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

// ── Error ───────────────────────────────────────────────────────────

/// パース時に発生しうるエラー。
#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// クォートが閉じられていない。引数は開始クォート文字（`'` or `"`）。
    UnterminatedQuote(char),
    /// リダイレクト演算子の後にターゲットファイル名がない。
    MissingRedirectTarget,
    /// パイプの前後にコマンドがない（`| ls`, `ls |`, `ls | | grep` 等）。
    EmptyPipelineSegment,
    /// `&` が行末以外に現れた、または `&` 単独の行。
    MisplacedBackground,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedQuote(c) => {
                write!(f, "unexpected EOF while looking for matching `{c}`")
            }
            Self::MissingRedirectTarget => write!(f, "syntax error: missing redirect target"),
            Self::EmptyPipelineSegment => write!(f, "syntax error near unexpected token `|`"),
            Self::MisplacedBackground => write!(f, "syntax error near unexpected token `&`"),
        }
    }
}

// ── Tokenizer (crate-private) ───────────────────────────────────────

/// トークナイザが生成する内部トークン型。
enum Token<'a> {
    Word(Cow<'a, str>),
    Pipe,
    RedirectIn,
    RedirectOut,
    RedirectAppend,
    Background,
}

/// 入力行をトークン列に変換するイテレータ。
///
/// 空白をスキップし、演算子（`|`, `<`, `>`, `>>`, `&`）とワードを識別する。
/// `Iterator<Item = Result<Token, ParseError>>` を実装。
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// ワードを 1 つ読み取る。クォートはワード途中で開始でき、引用符は
    /// 剥がされる。クォートを含まないワードは入力のスライスをそのまま返す。
    fn lex_word(&mut self) -> Result<Cow<'a, str>, ParseError> {
        let word_start = self.pos;
        let mut seg_start = self.pos;
        // クォートに遭遇した時点で Owned バッファに切り替える
        let mut owned: Option<String> = None;

        loop {
            let ch = match self.peek() {
                Some(c) => c,
                None => break,
            };
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' | b'|' | b'<' | b'>' | b'&' => break,
                b'\'' | b'"' => {
                    let buf = owned.get_or_insert_with(String::new);
                    buf.push_str(&self.input[seg_start..self.pos]);
                    self.pos += 1; // 開始クォートをスキップ
                    let quoted_start = self.pos;
                    loop {
                        match self.peek() {
                            None => return Err(ParseError::UnterminatedQuote(ch as char)),
                            Some(c) if c == ch => break,
                            Some(_) => self.pos += 1,
                        }
                    }
                    buf.push_str(&self.input[quoted_start..self.pos]);
                    self.pos += 1; // 終了クォートをスキップ
                    seg_start = self.pos;
                }
                _ => self.pos += 1,
            }
        }

        Ok(match owned {
            Some(mut buf) => {
                buf.push_str(&self.input[seg_start..self.pos]);
                Cow::Owned(buf)
            }
            None => Cow::Borrowed(&self.input[word_start..self.pos]),
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let ch = self.peek()?;

        match ch {
            b'|' => {
                self.pos += 1;
                Some(Ok(Token::Pipe))
            }
            b'<' => {
                self.pos += 1;
                Some(Ok(Token::RedirectIn))
            }
            b'>' => {
                self.pos += 1;
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                    Some(Ok(Token::RedirectAppend))
                } else {
                    Some(Ok(Token::RedirectOut))
                }
            }
            b'&' => {
                self.pos += 1;
                Some(Ok(Token::Background))
            }
            _ => Some(self.lex_word().map(Token::Word)),
        }
    }
}

// ── Parser ──────────────────────────────────────────────────────────

/// リダイレクトのターゲットを読み取る。ワード以外は構文エラー。
fn expect_target<'a>(tokens: &mut Tokenizer<'a>) -> Result<Cow<'a, str>, ParseError> {
    match tokens.next() {
        Some(Ok(Token::Word(target))) => Ok(target),
        Some(Err(e)) => Err(e),
        _ => Err(ParseError::MissingRedirectTarget),
    }
}

/// 入力行をパースして [`Pipeline`] を返す。
///
/// - 空入力（空白のみ） → `Ok(None)`
/// - 正常なコマンド行 → `Ok(Some(Pipeline))`
/// - 構文エラー → `Err(ParseError)`
pub fn parse(input: &str) -> Result<Option<Pipeline<'_>>, ParseError> {
    let mut tokens = Tokenizer::new(input);
    let mut commands: Vec<Command<'_>> = Vec::new();
    let mut cur = Command::default();
    let mut background = false;

    while let Some(result) = tokens.next() {
        let token = result?;
        // `&` は行の最終トークンに限る
        if background {
            return Err(ParseError::MisplacedBackground);
        }
        match token {
            Token::Word(w) => cur.args.push(w),
            Token::Pipe => {
                if cur.args.is_empty() {
                    return Err(ParseError::EmptyPipelineSegment);
                }
                commands.push(std::mem::take(&mut cur));
            }
            Token::RedirectIn => cur.infile = Some(expect_target(&mut tokens)?),
            Token::RedirectOut => {
                cur.outfile = Some(expect_target(&mut tokens)?);
                cur.append = false;
            }
            Token::RedirectAppend => {
                cur.outfile = Some(expect_target(&mut tokens)?);
                cur.append = true;
            }
            Token::Background => background = true,
        }
    }

    // 最終コマンドの処理: 引数かリダイレクトのどちらかがあれば push する
    if cur.args.is_empty() && cur.infile.is_none() && cur.outfile.is_none() {
        if commands.is_empty() {
            if background {
                // `&` 単独の行
                return Err(ParseError::MisplacedBackground);
            }
            return Ok(None); // 空入力
        }
        // 末尾パイプ（`ls |`）
        return Err(ParseError::EmptyPipelineSegment);
    }
    commands.push(cur);

    Ok(Some(Pipeline {
        commands,
        background,
    }))
}

// ── Tests ───────────────────────────────────────────────────────────
