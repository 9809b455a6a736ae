//! Markup scanner – a streaming, tag-aware tokenizer over untrusted HTML.
//!
//! The scanner never fails. Anything that does not look like a tag is text,
//! comments and doctype / processing instructions are skipped, and the
//! content of `<style>` / `<script>` is returned as a single raw text token.
//! Tag and attribute names are lower-cased.

/// One lexical unit of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    StartTag(StartTag),
    EndTag(String),
    /// Raw text between tags. Character references are *not* decoded.
    Text(&'a str),
}

/// An opening (or self-closing) tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["style", "script"];

/// Tokenize `input`. See [`Scanner`].
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Scanner::new(input).collect()
}

/// Iterator over the [`Token`]s of a markup string.
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw-text start tag; the next token is its content.
    raw_text_end: Option<&'static str>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text_end: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }

    /// Skip up to and including `terminator`, or to end of input.
    fn skip_past(&mut self, terminator: &str) {
        match self.rest().find(terminator) {
            Some(i) => self.pos += i + terminator.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char(), Some(c) if c.is_whitespace()) {
            self.advance_char();
        }
    }

    /// Does a tag start at the cursor? `<` must be followed by a letter, or by
    /// `/` and a letter; anything else is literal text.
    fn at_tag(&self) -> bool {
        let mut chars = self.rest().chars();
        if chars.next() != Some('<') {
            return false;
        }
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => true,
            Some('/') => matches!(chars.next(), Some(c) if c.is_ascii_alphabetic()),
            _ => false,
        }
    }

    fn at_markup_declaration(&self) -> bool {
        self.starts_with("<!") || self.starts_with("<?")
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.current_char(), Some(c) if c.is_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.advance_char();
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn read_attr_value(&mut self) -> String {
        match self.current_char() {
            Some(q @ ('"' | '\'')) => {
                self.advance_char();
                let start = self.pos;
                let end = self.rest().find(q).map(|i| start + i);
                let value = &self.input[start..end.unwrap_or(self.input.len())];
                self.pos = end.map(|e| e + 1).unwrap_or(self.input.len());
                crate::entities::decode_entities(value)
            }
            _ => {
                let start = self.pos;
                while matches!(self.current_char(), Some(c) if !c.is_whitespace() && c != '>') {
                    self.advance_char();
                }
                crate::entities::decode_entities(&self.input[start..self.pos])
            }
        }
    }

    fn read_start_tag(&mut self) -> StartTag {
        self.pos += 1; // '<'
        let mut tag = StartTag {
            name: self.read_name(),
            ..StartTag::default()
        };

        loop {
            self.skip_whitespace();
            if self.eof() {
                break;
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.starts_with("/>") {
                self.pos += 2;
                tag.self_closing = true;
                break;
            }
            let key = self.read_name();
            if key.is_empty() {
                // Junk such as a stray quote or slash – step over it.
                self.advance_char();
                continue;
            }
            self.skip_whitespace();
            let value = if self.starts_with("=") {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attr_value()
            } else {
                String::new()
            };
            tag.attrs.push((key, value));
        }
        tag
    }

    fn read_end_tag(&mut self) -> String {
        self.pos += 2; // '</'
        let name = self.read_name();
        self.skip_past(">");
        name
    }

    fn read_text(&mut self) -> &'a str {
        let start = self.pos;
        // Always consume at least one character so a literal '<' makes progress.
        self.advance_char();
        loop {
            match self.rest().find('<') {
                None => {
                    self.pos = self.input.len();
                    break;
                }
                Some(i) => {
                    self.pos += i;
                    if self.at_tag() || self.at_markup_declaration() {
                        break;
                    }
                    self.pos += 1;
                }
            }
        }
        &self.input[start..self.pos]
    }

    fn read_raw_text(&mut self, element: &str) -> &'a str {
        let start = self.pos;
        let close = format!("</{element}");
        let lower = self.rest().to_ascii_lowercase();
        let end = lower.find(&close).map(|i| start + i).unwrap_or(self.input.len());
        self.pos = end;
        &self.input[start..end]
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if let Some(element) = self.raw_text_end.take() {
            let text = self.read_raw_text(element);
            if !text.is_empty() {
                return Some(Token::Text(text));
            }
        }

        loop {
            if self.eof() {
                return None;
            }
            if self.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->");
                continue;
            }
            if self.at_markup_declaration() {
                self.skip_past(">");
                continue;
            }
            if self.at_tag() {
                if self.starts_with("</") {
                    return Some(Token::EndTag(self.read_end_tag()));
                }
                let tag = self.read_start_tag();
                if !tag.self_closing {
                    self.raw_text_end = RAW_TEXT_ELEMENTS
                        .iter()
                        .copied()
                        .find(|raw| *raw == tag.name);
                }
                return Some(Token::StartTag(tag));
            }
            return Some(Token::Text(self.read_text()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token<'static> {
        Token::StartTag(StartTag {
            name: name.to_string(),
            ..StartTag::default()
        })
    }

    #[test]
    fn tags_and_text_in_order() {
        let tokens = tokenize("<TR><td>1</TD></tr>");
        assert_eq!(
            tokens,
            vec![
                start("tr"),
                start("td"),
                Token::Text("1"),
                Token::EndTag("td".into()),
                Token::EndTag("tr".into()),
            ]
        );
    }

    #[test]
    fn attributes_may_contain_angle_brackets() {
        let tokens = tokenize(r#"<td title="a > b" class=x>v</td>"#);
        match &tokens[0] {
            Token::StartTag(t) => {
                assert_eq!(t.attr("title"), Some("a > b"));
                assert_eq!(t.attr("class"), Some("x"));
            }
            other => panic!("expected start tag, got {other:?}"),
        }
        assert_eq!(tokens[1], Token::Text("v"));
    }

    #[test]
    fn self_closing_break() {
        let tokens = tokenize("a<br/>b<BR />c");
        assert_eq!(tokens.len(), 5);
        assert!(matches!(&tokens[1], Token::StartTag(t) if t.name == "br" && t.self_closing));
        assert!(matches!(&tokens[3], Token::StartTag(t) if t.name == "br"));
    }

    #[test]
    fn comments_and_doctype_skipped() {
        let tokens = tokenize("<!DOCTYPE html><!-- <tr> -->x");
        assert_eq!(tokens, vec![Token::Text("x")]);
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let tokens = tokenize("1 < 2 <td>x");
        assert_eq!(tokens[0], Token::Text("1 < 2 "));
        assert_eq!(tokens[1], start("td"));
    }

    #[test]
    fn style_content_is_raw() {
        let tokens = tokenize("<style>td > p { color: red }</style><p>x</p>");
        assert_eq!(tokens[1], Token::Text("td > p { color: red }"));
        assert_eq!(tokens[2], Token::EndTag("style".into()));
    }

    #[test]
    fn unterminated_tag_does_not_hang() {
        let tokens = tokenize("<td class=\"x");
        assert_eq!(tokens.len(), 1);
    }
}
