//! A module implementing lexical analysis (tokenization) for the shell's command lines.
//!
//! The lexer is a single left-to-right pass over the line. Quotes and backslashes are
//! consumed while building words; the result is a plain list of argument strings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current: String,
}

impl LexingFSM {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            current: String::new(),
        }
    }

    /// Runs the machine to the end of the input and returns the collected words.
    ///
    /// An unterminated quote is not an error: the quoted text simply runs to the end of
    /// the line.
    fn make_tokens(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch, &mut out),
                LexingState::SingleQuoted => self.handle_single_quote(ch),
                LexingState::DoubleQuoted => self.handle_double_quote(ch),
            }
        }

        self.flush_word(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if c.is_whitespace() => self.flush_word(out),
            '\'' => self.state = LexingState::SingleQuoted,
            '"' => self.state = LexingState::DoubleQuoted,
            '\\' => match self.read_char() {
                Some(escaped) => self.current.push(escaped),
                None => self.current.push('\\'),
            },
            c => self.current.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Unquoted,
            // No escaping inside single quotes: the backslash and what follows stay.
            '\\' => {
                self.current.push('\\');
                if let Some(next) = self.read_char() {
                    self.current.push(next);
                }
            }
            c => self.current.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Unquoted,
            '\\' => match self.read_char() {
                Some(c @ ('\\' | '"' | '$' | '`')) => self.current.push(c),
                Some(c) => {
                    self.current.push('\\');
                    self.current.push(c);
                }
                None => self.current.push('\\'),
            },
            c => self.current.push(c),
        }
    }

    fn flush_word(&mut self, out: &mut Vec<String>) {
        if !self.current.is_empty() {
            out.push(std::mem::take(&mut self.current));
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits `line` into argument words honoring single quotes, double quotes and
/// backslash escapes. Empty words are never produced, so `''` on its own yields
/// nothing.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}

/// Splits a raw line into pipeline stage substrings at every unquoted `|`.
///
/// Quotes and backslash escapes are tracked the same way [`split_into_tokens`] tracks
/// them, so `echo 'a|b'` stays a single stage. The stage texts are returned verbatim
/// (untrimmed, possibly empty); a line without a separator yields exactly one stage.
pub fn split_pipeline(line: &str) -> Vec<&str> {
    let mut stages = Vec::new();
    let mut start = 0;
    let (mut sq, mut dq, mut esc) = (false, false, false);

    for (i, c) in line.char_indices() {
        if esc {
            esc = false;
            continue;
        }
        match c {
            // The lexer consumes the character after a backslash in every mode.
            '\\' => esc = true,
            '\'' if !dq => sq = !sq,
            '"' if !sq => dq = !dq,
            '|' if !sq && !dq => {
                stages.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    stages.push(&line[start..]);
    stages
}
