//! Rebuilds reading-order lines from positioned text runs.
//! PDF coordinates grow upwards: a larger `top` is higher on the page.
//! Horizontal gaps wider than COLUMN_GAP_PTS split a line into cells, which
//! is what lets table_detect render PLS schedules as Markdown tables.

/// Runs whose vertical centers differ by less than this share a line (points).
const LINE_TOLERANCE_PTS: f32 = 3.0;

/// Gap between runs that starts a new cell (points).
const COLUMN_GAP_PTS: f32 = 14.0;

/// Gap below which adjacent runs are glued without a space (points).
const GLUE_GAP_PTS: f32 = 0.8;

/// A piece of text with its bounding box on the page, in PDF points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextRun {
    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// One visual line split into cells at wide horizontal gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutLine {
    pub cells: Vec<String>,
}

impl LayoutLine {
    pub fn is_multi_cell(&self) -> bool {
        self.cells.len() >= 2
    }

    pub fn joined(&self) -> String {
        self.cells.join(" ")
    }
}

/// Group runs into lines (top to bottom) and split each line into cells.
pub fn group_lines(runs: Vec<TextRun>) -> Vec<LayoutLine> {
    let mut runs: Vec<TextRun> = runs
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .collect();
    if runs.is_empty() {
        return Vec::new();
    }

    runs.sort_by(|a, b| b.center_y().total_cmp(&a.center_y()));

    let mut rows: Vec<Vec<TextRun>> = Vec::new();
    let mut current: Vec<TextRun> = Vec::new();
    let mut current_y = runs[0].center_y();

    for run in runs {
        if (current_y - run.center_y()).abs() <= LINE_TOLERANCE_PTS {
            current.push(run);
        } else {
            rows.push(std::mem::take(&mut current));
            current_y = run.center_y();
            current.push(run);
        }
    }
    if !current.is_empty() {
        rows.push(current);
    }

    rows.into_iter().map(split_cells).collect()
}

fn split_cells(mut row: Vec<TextRun>) -> LayoutLine {
    row.sort_by(|a, b| a.left.total_cmp(&b.left));

    let mut cells: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut prev_right: Option<f32> = None;

    for run in row {
        let text = run.text.trim();
        match prev_right {
            Some(right) if run.left - right > COLUMN_GAP_PTS => {
                cells.push(std::mem::take(&mut cell));
            }
            Some(right) if run.left - right > GLUE_GAP_PTS => cell.push(' '),
            _ => {}
        }
        cell.push_str(text);
        prev_right = Some(run.right);
    }
    if !cell.is_empty() {
        cells.push(cell);
    }

    LayoutLine { cells }
}
