use std::sync::LazyLock;

use regex::Regex;

use super::layout::LayoutLine;

/// A tabular block needs at least this many consecutive rows.
const MIN_TABLE_ROWS: usize = 2;

static COLUMN_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+| {3,}").unwrap());
static SEPARATOR_CELL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-{2,}:?$").unwrap());

/// Render positioned layout lines: runs of multi-cell lines become Markdown
/// tables, everything else is emitted as plain lines.
pub fn render_layout(lines: &[LayoutLine]) -> String {
    let rows: Vec<Option<Vec<String>>> = lines
        .iter()
        .map(|line| line.is_multi_cell().then(|| line.cells.clone()))
        .collect();
    let plain: Vec<String> = lines.iter().map(LayoutLine::joined).collect();
    render_blocks(&rows, &plain)
}

/// Rebuild Markdown tables from plain text whose columns survived only as
/// tabs, pipes or wide space gaps (typical OCR output of a schedule).
pub fn structure_text_tables(text: &str) -> String {
    let source: Vec<&str> = text.lines().collect();
    let rows: Vec<Option<Vec<String>>> = source.iter().map(|l| split_tabular_line(l)).collect();
    let plain: Vec<String> = source.iter().map(|l| l.to_string()).collect();
    render_blocks(&rows, &plain)
}

fn render_blocks(rows: &[Option<Vec<String>>], plain: &[String]) -> String {
    let mut out: Vec<String> = Vec::with_capacity(plain.len());
    let mut i = 0;

    while i < rows.len() {
        let run_end = rows[i..]
            .iter()
            .position(Option::is_none)
            .map_or(rows.len(), |offset| i + offset);

        if run_end - i >= MIN_TABLE_ROWS {
            let block: Vec<Vec<String>> = rows[i..run_end]
                .iter()
                .flatten()
                .filter(|cells| !is_separator_row(cells))
                .cloned()
                .collect();
            out.push(render_markdown_table(&block));
            i = run_end;
        } else {
            out.push(plain[i].clone());
            i += 1;
        }
    }

    out.join("\n")
}

/// Render rows as a Markdown pipe table. The first row is the header;
/// short rows are padded to the widest row.
pub fn render_markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| row.get(c).map(|s| escape_cell(s)).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.trim().replace('|', "/")
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .filter(|c| !c.trim().is_empty())
        .all(|c| SEPARATOR_CELL.is_match(c.trim()))
}

/// Split a line into cells when it looks tabular, `None` otherwise.
pub fn split_tabular_line(line: &str) -> Option<Vec<String>> {
    if !is_tabular_line(line) {
        return None;
    }
    let trimmed = line.trim();

    let cells: Vec<String> = if trimmed.matches('|').count() >= 2 {
        let inner = trimmed.trim_start_matches('|').trim_end_matches('|');
        inner.split('|').map(|c| c.trim().to_string()).collect()
    } else {
        COLUMN_GAP
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    };

    (cells.len() >= 2).then_some(cells)
}

/// Heuristic: a line looks tabular if it has multiple columns separated by
/// tabs, pipes, or consistent multi-space gaps.
///
/// Patterns detected:
/// - Tab-separated: "Serviço\tPeso\tAcumulado"
/// - Pipe-separated: "Serviço | Peso | Acumulado"
/// - Multi-space aligned: "Fundações    4,50    100,00"
fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() < 5 {
        return false;
    }

    if trimmed.matches('\t').count() >= 2 {
        return true;
    }

    if trimmed.matches('|').count() >= 2 {
        return true;
    }

    count_multi_space_gaps(trimmed) >= 2
}

/// Count runs of 3+ consecutive spaces that separate non-empty text segments.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut in_gap = false;
    let mut gap_len = 0;

    for ch in text.chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len >= 3 && !in_gap {
                in_gap = true;
                count += 1;
            }
        } else {
            in_gap = false;
            gap_len = 0;
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cells: &[&str]) -> LayoutLine {
        LayoutLine {
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn tab_separated_is_tabular() {
        assert!(is_tabular_line("Serviço\tPeso\tAcumulado"));
    }

    #[test]
    fn pipe_separated_is_tabular() {
        assert!(is_tabular_line("| Item | Peso | Acum |"));
    }

    #[test]
    fn multi_space_is_tabular() {
        assert!(is_tabular_line("Fundações    4,50    100,00"));
    }

    #[test]
    fn prose_not_tabular() {
        assert!(!is_tabular_line("O imóvel situa-se em área urbana consolidada."));
        assert!(!is_tabular_line(""));
        assert!(!is_tabular_line("abc"));
    }

    #[test]
    fn counts_gaps() {
        assert_eq!(count_multi_space_gaps("A   B   C"), 2);
        assert_eq!(count_multi_space_gaps("A B"), 0);
    }

    #[test]
    fn splits_space_aligned_columns() {
        assert_eq!(
            split_tabular_line("Fundações    4,50    100,00"),
            Some(vec!["Fundações".to_string(), "4,50".into(), "100,00".into()])
        );
    }

    #[test]
    fn splits_pipe_columns() {
        assert_eq!(
            split_tabular_line("| Item | Peso | Acum |"),
            Some(vec!["Item".to_string(), "Peso".into(), "Acum".into()])
        );
    }

    #[test]
    fn renders_header_and_separator() {
        let table = render_markdown_table(&[
            vec!["Serviço".into(), "Peso".into()],
            vec!["Fundações".into(), "4,50".into()],
        ]);
        assert_eq!(
            table,
            "| Serviço | Peso |\n| --- | --- |\n| Fundações | 4,50 |"
        );
    }

    #[test]
    fn pads_short_rows() {
        let table = render_markdown_table(&[
            vec!["a".into(), "b".into(), "c".into()],
            vec!["d".into()],
        ]);
        assert!(table.ends_with("| d |  |  |"));
    }

    #[test]
    fn layout_tables_and_prose_interleave() {
        let text = render_layout(&[
            line(&["PLANILHA DE LEVANTAMENTO"]),
            line(&["Serviço", "Peso"]),
            line(&["Fundações", "4,50"]),
            line(&["Observações finais"]),
        ]);
        assert_eq!(
            text,
            "PLANILHA DE LEVANTAMENTO\n| Serviço | Peso |\n| --- | --- |\n| Fundações | 4,50 |\nObservações finais"
        );
    }

    #[test]
    fn single_multi_cell_line_stays_plain() {
        let text = render_layout(&[line(&["Data", "10/01/2024"])]);
        assert_eq!(text, "Data 10/01/2024");
    }

    #[test]
    fn existing_markdown_table_is_not_doubled() {
        let src = "| A | B |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(structure_text_tables(src), src);
    }

    #[test]
    fn ocr_text_gets_table() {
        let src = "Cronograma\nItem    Peso    Acumulado\nPiso    3,20    55,00\nfim";
        let out = structure_text_tables(src);
        assert_eq!(
            out,
            "Cronograma\n| Item | Peso | Acumulado |\n| --- | --- | --- |\n| Piso | 3,20 | 55,00 |\nfim"
        );
    }
}
