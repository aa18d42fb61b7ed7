use std::io::{self, BufRead, Cursor, Seek, SeekFrom};

/// The quoting context of the token being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteMode {
    None,
    Single,
    Double,
    /// Multi-line text between `;` characters at the start of lines.
    Semicolon,
}

impl QuoteMode {
    fn quote_char(self) -> Option<u8> {
        match self {
            QuoteMode::Single => Some(b'\''),
            QuoteMode::Double => Some(b'"'),
            _ => None,
        }
    }
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b' ' | b'\n' | b'\t' | b'\r')
}

/// Reads whitespace delimited tokens from a mmCIF document, following
/// the quoting rules of the format, while keeping track of the byte offset
/// in the underlying reader.
pub struct CifCursor<R> {
    input: R,
    position: u64,
    /// Last byte consumed, `\n` at the start of the input or after a seek.
    previous: u8,
}

impl<R> CifCursor<R>
where
    R: BufRead + Seek,
{
    pub fn new(input: R) -> Self {
        CifCursor {
            input,
            position: 0,
            previous: b'\n',
        }
    }

    /// Byte offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to the given byte offset. The offset must be the start of a line.
    pub fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = self.input.seek(SeekFrom::Start(position))?;
        self.previous = b'\n';
        Ok(())
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.fill_buf()?.first().copied())
    }

    fn bump(&mut self, byte: u8) {
        self.input.consume(1);
        self.position += 1;
        self.previous = byte;
    }

    /// Read a full line, without its line terminator.
    ///
    /// Returns `None` at the end of the input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buffer = Vec::new();
        let read = self.input.read_until(b'\n', &mut buffer)?;
        if read == 0 {
            return Ok(None);
        }
        self.position += read as u64;
        self.previous = buffer[read - 1];
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
        }
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }

    /// Read `count` tokens.
    ///
    /// Fewer tokens are returned if the input ends first. After the last
    /// token, the delimiters that follow are consumed so the cursor stands
    /// at the beginning of the next record.
    pub fn tokenize(&mut self, count: usize) -> io::Result<Vec<String>> {
        self.tokenize_within(count, u64::MAX)
    }

    /// Read `count` tokens, without starting a token at or after the `end` offset.
    pub fn tokenize_within(&mut self, count: usize, end: u64) -> io::Result<Vec<String>> {
        let mut tokens = Vec::with_capacity(count);
        let mut current: Vec<u8> = Vec::new();
        let mut in_token = false;
        let mut mode = QuoteMode::None;

        while tokens.len() < count {
            if !in_token && self.position >= end {
                break;
            }
            let Some(byte) = self.peek()? else { break };
            let previous = self.previous;
            self.bump(byte);
            match mode {
                QuoteMode::None => {
                    if is_delimiter(byte) {
                        if in_token {
                            tokens.push(finish_token(&current, mode));
                            current.clear();
                            in_token = false;
                        }
                        continue;
                    }
                    current.push(byte);
                    if in_token {
                        continue;
                    }
                    in_token = true;
                    mode = match byte {
                        b'\'' if is_delimiter(previous) => QuoteMode::Single,
                        b'"' if is_delimiter(previous) => QuoteMode::Double,
                        b';' if previous == b'\n' => QuoteMode::Semicolon,
                        _ => QuoteMode::None,
                    };
                    // A lone quote is a literal value.
                    if mode.quote_char().is_some() && self.next_closes_quote()? {
                        tokens.push(finish_token(&current, mode));
                        current.clear();
                        in_token = false;
                        mode = QuoteMode::None;
                    }
                }
                QuoteMode::Single | QuoteMode::Double => {
                    if byte == b'\n' || byte == b'\r' {
                        // Quoted values cannot span several lines.
                        tokens.push(finish_token(&current, mode));
                        current.clear();
                        in_token = false;
                        mode = QuoteMode::None;
                        continue;
                    }
                    current.push(byte);
                    if Some(byte) == mode.quote_char() && self.next_closes_quote()? {
                        tokens.push(finish_token(&current, mode));
                        current.clear();
                        in_token = false;
                        mode = QuoteMode::None;
                    }
                }
                QuoteMode::Semicolon => {
                    current.push(byte);
                    if byte == b';' && previous == b'\n' {
                        tokens.push(finish_token(&current, mode));
                        current.clear();
                        in_token = false;
                        mode = QuoteMode::None;
                    }
                }
            }
        }
        if in_token {
            tokens.push(finish_token(&current, mode));
        }

        while self.position < end {
            let Some(byte) = self.peek()? else { break };
            if !is_delimiter(byte) {
                break;
            }
            self.bump(byte);
        }
        Ok(tokens)
    }

    fn next_closes_quote(&mut self) -> io::Result<bool> {
        Ok(self.peek()?.map_or(true, is_delimiter))
    }
}

/// Tokenize a string on its own, outside of any document.
pub fn tokenize_str(text: &str, count: usize) -> Vec<String> {
    // Reading from memory cannot fail.
    CifCursor::new(Cursor::new(text.as_bytes()))
        .tokenize(count)
        .unwrap_or_default()
}

fn finish_token(raw: &[u8], mode: QuoteMode) -> String {
    let text = String::from_utf8_lossy(raw);
    match mode {
        QuoteMode::None => text.into_owned(),
        QuoteMode::Single | QuoteMode::Double => {
            let quote = if mode == QuoteMode::Single { '\'' } else { '"' };
            if text.len() >= 2 && text.ends_with(quote) {
                text[1..text.len() - 1].to_owned()
            } else {
                text.into_owned()
            }
        }
        QuoteMode::Semicolon => {
            let inner = text.strip_prefix(';').unwrap_or(&text);
            match inner.strip_suffix("\n;") {
                Some(inner) => inner.strip_suffix('\r').unwrap_or(inner).to_owned(),
                None => inner.to_owned(),
            }
        }
    }
}
