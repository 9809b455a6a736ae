//! Row extraction – best-effort salvage of glossary rows from untrusted HTML
//! fragments.
//!
//! The extractor walks the [`crate::scan`] token stream with a small state
//! machine instead of matching patterns, so unbalanced markup degrades into
//! dropped rows rather than misaligned cells. It never fails: a fragment with
//! nothing usable yields an empty vector.

use log::debug;

use crate::entities::decode_entities;
use crate::model::Row;
use crate::scan::{tokenize, Token};

/// Number of leading cells that make up a row (serial, English, Hindi).
const ROW_CELLS: usize = 3;

/// Extract glossary rows from `fragment`, in document order.
///
/// * If the fragment has one or more `<tbody>` regions (open tag followed by a
///   close tag) only those are scanned; otherwise the whole fragment is.
/// * A `<tr>` without a close tag ends at the next `<tr>` or the end of the
///   scope; a `<td>` without one ends at the next cell or the end of its row.
/// * `<th>` cells are skipped.
/// * `<br>` becomes a newline. All other tags are stripped, character
///   references are decoded and whitespace collapses per line.
/// * A row is kept only if it has at least three cells and the first three
///   are non-empty. Extra cells are ignored.
/// * A table nested inside a cell is not interpreted: its tags do not split
///   the outer row and its text ends up in the enclosing cell.
pub fn extract_rows(fragment: &str) -> Vec<Row> {
    let tokens = tokenize(fragment);
    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for (start, end) in scopes(&tokens) {
        let mut machine = RowMachine::default();
        for token in &tokens[start..end] {
            machine.feed(token, &mut rows, &mut dropped);
        }
        machine.finish_row(&mut rows, &mut dropped);
    }

    if dropped > 0 {
        debug!(
            "extract: kept {} row(s), dropped {} incomplete row(s)",
            rows.len(),
            dropped
        );
    }
    rows
}

/// Token ranges to scan: the inside of every `<tbody>…</tbody>` pair, or the
/// whole stream when there is none.
fn scopes(tokens: &[Token<'_>]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if is_start(&tokens[i], "tbody") {
            let close = tokens[i + 1..]
                .iter()
                .position(|t| is_end(t, "tbody"))
                .map(|p| i + 1 + p);
            match close {
                Some(end) => {
                    ranges.push((i + 1, end));
                    i = end + 1;
                    continue;
                }
                // An unclosed tbody is not a region.
                None => break,
            }
        }
        i += 1;
    }

    if ranges.is_empty() {
        ranges.push((0, tokens.len()));
    }
    ranges
}

fn is_start(token: &Token<'_>, name: &str) -> bool {
    matches!(token, Token::StartTag(t) if t.name == name)
}

fn is_end(token: &Token<'_>, name: &str) -> bool {
    matches!(token, Token::EndTag(n) if n == name)
}

#[derive(Debug, Default)]
enum Cell {
    #[default]
    None,
    /// A `<td>` being filled, one entry per line.
    Data(Vec<String>),
    /// A `<th>`; its text is discarded.
    Header,
}

#[derive(Debug, Default)]
struct RowMachine {
    /// Cells of the open row, `None` outside of a `<tr>`.
    row: Option<Vec<String>>,
    cell: Cell,
    /// Tables opened inside the current cell.
    nested_tables: usize,
    /// Inside `<style>` / `<script>`.
    raw: bool,
}

impl RowMachine {
    fn feed(&mut self, token: &Token<'_>, rows: &mut Vec<Row>, dropped: &mut usize) {
        match token {
            Token::StartTag(tag) => match tag.name.as_str() {
                "style" | "script" if !tag.self_closing => self.raw = true,
                "br" => {
                    if let Cell::Data(lines) = &mut self.cell {
                        lines.push(String::new());
                    }
                }
                "table" if self.in_cell() => self.nested_tables += 1,
                _ if self.nested_tables > 0 => {}
                "tr" => {
                    self.finish_row(rows, dropped);
                    self.row = Some(Vec::new());
                }
                "td" if self.row.is_some() => {
                    self.close_cell();
                    self.cell = Cell::Data(vec![String::new()]);
                }
                "th" if self.row.is_some() => {
                    self.close_cell();
                    self.cell = Cell::Header;
                }
                _ => {}
            },
            Token::EndTag(name) => match name.as_str() {
                "style" | "script" => self.raw = false,
                "table" if self.nested_tables > 0 => self.nested_tables -= 1,
                _ if self.nested_tables > 0 => {}
                "td" | "th" => self.close_cell(),
                "tr" | "table" => self.finish_row(rows, dropped),
                _ => {}
            },
            Token::Text(text) => {
                if self.raw {
                    return;
                }
                if let Cell::Data(lines) = &mut self.cell {
                    if let Some(line) = lines.last_mut() {
                        line.push_str(&decode_entities(text));
                    }
                }
            }
        }
    }

    fn in_cell(&self) -> bool {
        !matches!(self.cell, Cell::None)
    }

    fn close_cell(&mut self) {
        self.nested_tables = 0;
        match std::mem::take(&mut self.cell) {
            Cell::Data(lines) => {
                if let Some(row) = self.row.as_mut() {
                    row.push(normalize_cell(&lines));
                }
            }
            Cell::Header | Cell::None => {}
        }
    }

    fn finish_row(&mut self, rows: &mut Vec<Row>, dropped: &mut usize) {
        self.close_cell();
        let Some(cells) = self.row.take() else {
            return;
        };
        if cells.len() >= ROW_CELLS && cells[..ROW_CELLS].iter().all(|c| !c.is_empty()) {
            let mut cells = cells.into_iter();
            let (serial, english, hindi) = (
                cells.next().unwrap_or_default(),
                cells.next().unwrap_or_default(),
                cells.next().unwrap_or_default(),
            );
            rows.push(Row::new(serial, english, hindi));
        } else {
            *dropped += 1;
        }
    }
}

/// Collapse whitespace inside each line, trim it, and drop empty lines.
fn normalize_cell(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(s: &str, e: &str, h: &str) -> Row {
        Row::new(s, e, h)
    }

    #[test]
    fn well_formed_rows_in_order() {
        let html = "<table><tbody>\
            <tr><td>1</td><td>Hello</td><td>नमस्ते</td></tr>\
            <tr><td>2</td><td><b>Thank</b> you</td><td>धन्यवाद</td></tr>\
            </tbody></table>";
        assert_eq!(
            extract_rows(html),
            vec![row("1", "Hello", "नमस्ते"), row("2", "Thank you", "धन्यवाद")]
        );
    }

    #[test]
    fn line_breaks_become_single_newlines() {
        let html = "<tr><td>1</td><td>Good<br>morning<BR/><br />  </td><td>सुप्रभात</td></tr>";
        let rows = extract_rows(html);
        assert_eq!(rows[0].english, "Good\nmorning");
    }

    #[test]
    fn whitespace_collapses_and_trims() {
        let html = "<tr><td> 1 </td><td>\n  Good \t  night </td><td>&nbsp;शुभ  रात्रि&nbsp;</td></tr>";
        assert_eq!(extract_rows(html), vec![row("1", "Good night", "शुभ रात्रि")]);
    }

    #[test]
    fn short_or_blank_rows_are_dropped() {
        let html = "<tr><td>1</td><td>Hello</td></tr>\
                    <tr><td>2</td><td>Bye</td><td>   </td></tr>\
                    <tr><td>3</td><td>Yes</td><td>हाँ</td></tr>";
        assert_eq!(extract_rows(html), vec![row("3", "Yes", "हाँ")]);
    }

    #[test]
    fn extra_cells_ignored() {
        let html = "<tr><td>1</td><td>Water</td><td>पानी</td><td>noun</td></tr>";
        assert_eq!(extract_rows(html), vec![row("1", "Water", "पानी")]);
    }

    #[test]
    fn tbody_scope_excludes_header_rows() {
        let html = "<table>\
            <thead><tr><td>#</td><td>English</td><td>Hindi</td></tr></thead>\
            <tbody><tr><td>1</td><td>Sun</td><td>सूरज</td></tr></tbody>\
            </table>";
        assert_eq!(extract_rows(html), vec![row("1", "Sun", "सूरज")]);
    }

    #[test]
    fn multiple_tbody_regions_scanned_in_order() {
        let html = "<tbody><tr><td>1</td><td>a</td><td>क</td></tr></tbody>\
                    <tr><td>x</td><td>outside</td><td>बाहर</td></tr>\
                    <tbody><tr><td>2</td><td>b</td><td>ख</td></tr></tbody>";
        assert_eq!(extract_rows(html), vec![row("1", "a", "क"), row("2", "b", "ख")]);
    }

    #[test]
    fn unclosed_tags_close_implicitly() {
        let html = "<table><tr><td>1<td>One<td>एक<tr><td>2<td>Two<td>दो</table>";
        assert_eq!(extract_rows(html), vec![row("1", "One", "एक"), row("2", "Two", "दो")]);
    }

    #[test]
    fn header_cells_are_not_data() {
        let html = "<tr><th>1</th><td>a</td><td>b</td><td>c</td></tr>";
        assert_eq!(extract_rows(html), vec![row("a", "b", "c")]);
    }

    #[test]
    fn entities_decoded_once() {
        let html = "<tr><td>1</td><td>Tom &amp; Jerry &lt;3</td><td>&#2344;</td></tr>";
        assert_eq!(extract_rows(html), vec![row("1", "Tom & Jerry <3", "न")]);
    }

    #[test]
    fn tag_names_match_on_boundaries() {
        let html = "<track><tr><td>1</td><td>a</td><td>b</td></tr>";
        assert_eq!(extract_rows(html).len(), 1);
    }

    #[test]
    fn nested_table_text_leaks_into_cell() {
        let html = "<tr><td>1</td><td>outer<table><tr><td>inner</td></tr></table></td><td>बाहरी</td></tr>";
        assert_eq!(extract_rows(html), vec![row("1", "outerinner", "बाहरी")]);
    }

    #[test]
    fn degenerate_fragments_yield_nothing() {
        assert!(extract_rows("").is_empty());
        assert!(extract_rows("<p>no table here</p>").is_empty());
        assert!(extract_rows("<tbody><tr><td>1").is_empty());
    }
}
