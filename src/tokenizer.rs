//! Word tokenization with on-the-fly case folding
//!
//! A word is a maximal run of letters from one alphabet's basic range. Anything
//! else (digits, punctuation, whitespace, letters from other scripts) ends the
//! current word. Uppercase letters are folded to lowercase while scanning, so a
//! page is tokenized and normalized in a single pass over its characters.

use std::str::Chars;

/// Letter range recognized as word characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// а..я and А..Я (ё lies outside the contiguous range and splits words)
    Cyrillic,
    /// a..z and A..Z
    Latin,
}

impl Alphabet {
    /// Lowercase form of `c` if it belongs to this alphabet
    #[inline]
    pub fn fold(self, c: char) -> Option<char> {
        match self {
            Alphabet::Cyrillic => match c {
                'а'..='я' => Some(c),
                // А..Я sit exactly 0x20 below а..я
                'А'..='Я' => char::from_u32(c as u32 + 0x20),
                _ => None,
            },
            Alphabet::Latin => match c {
                'a'..='z' => Some(c),
                'A'..='Z' => Some(c.to_ascii_lowercase()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    alphabet: Alphabet,
    min_len: usize,
}

impl Tokenizer {
    pub fn new(alphabet: Alphabet, min_len: usize) -> Self {
        Self { alphabet, min_len }
    }

    /// Lazily split `text` into normalized words
    ///
    /// Calling this again over the same text restarts the sequence.
    pub fn words<'t>(&self, text: &'t str) -> Words<'t> {
        Words {
            chars: text.chars(),
            alphabet: self.alphabet,
            min_len: self.min_len,
            word: String::new(),
            word_chars: 0,
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(Alphabet::Cyrillic, 0)
    }
}

/// Word sequence over one text
///
/// Use [`Words::next_word`] in hot loops: it lends the accumulator instead of
/// allocating a `String` per word like the `Iterator` impl does.
pub struct Words<'t> {
    chars: Chars<'t>,
    alphabet: Alphabet,
    min_len: usize,
    word: String,
    word_chars: usize,
}

impl<'t> Words<'t> {
    pub fn next_word(&mut self) -> Option<&str> {
        self.word.clear();
        self.word_chars = 0;
        loop {
            match self.chars.next() {
                Some(c) => match self.alphabet.fold(c) {
                    Some(lower) => {
                        self.word.push(lower);
                        self.word_chars += 1;
                    }
                    None if self.accept() => return Some(&self.word),
                    None => {
                        self.word.clear();
                        self.word_chars = 0;
                    }
                },
                // Flush whatever is pending at end of input
                None if self.accept() => return Some(&self.word),
                None => return None,
            }
        }
    }

    #[inline]
    fn accept(&self) -> bool {
        self.word_chars > 0 && self.word_chars >= self.min_len
    }
}

impl<'t> Iterator for Words<'t> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_word().map(str::to_owned)
    }
}
