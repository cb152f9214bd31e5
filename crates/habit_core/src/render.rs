//! Plain-text projection of a [`Grid`].

use crate::habit::{Cell, HabitRow};
use crate::tracker::Grid;

/// Width of a readable line when `matchLineLength` is on.
pub const READABLE_LINE_WIDTH: usize = 80;

const CELL_WIDTH: usize = 3;
const MIN_NAME_WIDTH: usize = 6;
const STREAK_WIDTH: usize = 6;

pub fn render_text(grid: &Grid) -> String {
    if let Some(message) = &grid.empty_message {
        return format!("{message}\n");
    }

    let name_width = name_column_width(grid);
    let mut out = String::new();

    out.push_str(&" ".repeat(name_width));
    for header in &grid.header {
        let label = format!("{:>2}", header.day_of_month);
        if header.is_today {
            out.push_str(&format!("[{label}"));
        } else {
            out.push_str(&format!(" {label}"));
        }
    }
    out.push('\n');
    out.push_str(&" ".repeat(name_width));
    for header in &grid.header {
        out.push_str(&format!(" {}", header.weekday.short_label()));
    }
    out.push('\n');

    for row in &grid.rows {
        out.push_str(&render_row(row, name_width));
        out.push('\n');
        if let Some(warning) = &row.warning {
            out.push_str(&format!("{:width$}! {warning}\n", "", width = name_width));
        }
    }
    out
}

fn render_row(row: &HabitRow, name_width: usize) -> String {
    let mut line = fit(&row.name, name_width.saturating_sub(1));
    line.push_str(&" ".repeat(name_width - line.chars().count()));
    for cell in &row.cells {
        line.push_str(&format!("  {}", mark(cell)));
    }
    let streak = row.current_streak();
    if streak > 0 {
        line.push_str(&format!("  {streak:>3}d"));
    }
    line.trim_end().to_string()
}

fn mark(cell: &Cell) -> char {
    if cell.ticked {
        '■'
    } else {
        '·'
    }
}

fn name_column_width(grid: &Grid) -> usize {
    let longest = grid
        .rows
        .iter()
        .map(|row| row.name.chars().count())
        .max()
        .unwrap_or(0);
    let natural = (longest + 1).max(MIN_NAME_WIDTH);
    if !grid.config.match_line_length {
        return natural;
    }
    let cells = grid.header.len() * CELL_WIDTH + STREAK_WIDTH;
    let available = READABLE_LINE_WIDTH.saturating_sub(cells);
    natural.min(available.max(MIN_NAME_WIDTH))
}

/// Truncates to `width` characters, marking the cut with an ellipsis.
fn fit(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut cut: String = name.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
