use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
};

use crate::domain::HELP_TEXT;
use crate::model::{Model, Modus};
use crate::view::SortDirection;

pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        TableUI
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TABLE_HEADER_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(area);

        self.draw_header(model, frame, header_area);
        if model.view().rows().is_empty() {
            let no_results = Paragraph::new("No results").bold().centered();
            frame.render_widget(no_results, table_area);
        } else {
            self.draw_rows(model, frame, table_area);
        }
        self.draw_status(model, frame, status_area);

        match model.modus() {
            Modus::FILTER => self.draw_filter_menu(model, frame, area),
            Modus::POPUP => self.draw_help(frame, area),
            _ => {}
        }
    }

    fn draw_header(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let (_, curser_column) = model.curser();
        let sort = model.view().sort_spec();
        let mut spans = Vec::new();

        for idx in visible_columns(model, area.width as usize) {
            let key = &model.columns()[idx];
            let width = model.column_widths()[idx];
            let mut label = key.clone();
            if let Some(spec) = sort
                && spec.key == *key
            {
                label.push_str(match spec.direction {
                    SortDirection::Ascending => " ▲",
                    SortDirection::Descending => " ▼",
                });
            }
            if model.view().filters().active_columns().any(|k| k == key) {
                label.push_str(" *");
            }
            let mut style = Style::new().add_modifier(Modifier::BOLD);
            if idx == curser_column {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            spans.push(Span::styled(pad(&label, width), style));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_rows(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let (curser_row, _) = model.curser();
        let (offset_row, _) = model.offsets();
        let rows = model.view().rows();
        let rend = std::cmp::min(offset_row + area.height as usize, rows.len());
        let columns = visible_columns(model, area.width as usize);

        let mut lines = Vec::with_capacity(rend - offset_row);
        for (ridx, row) in rows[offset_row..rend].iter().enumerate() {
            let mut spans = Vec::with_capacity(columns.len());
            for &idx in columns.iter() {
                let key = &model.columns()[idx];
                let width = model.column_widths()[idx];
                let value = row.get(key).map(String::as_str).unwrap_or("");
                spans.push(Span::raw(pad(value, width)));
            }
            let mut line = Line::from(spans);
            if offset_row + ridx == curser_row {
                line = line.style(Style::new().add_modifier(Modifier::REVERSED));
            }
            lines.push(line);
        }

        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_status(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if model.raw_keyevents() {
            // search term entry
            let input = model.cmdinput();
            let prompt = format!("/{}", input.input);
            frame.render_widget(Paragraph::new(prompt), area);
            frame.set_cursor_position(Position::new(
                area.x + 1 + input.curser_pos as u16,
                area.y,
            ));
            return;
        }

        let view = model.view();
        let mut status = format!(
            "{} | {}/{} rows",
            model.name(),
            view.rows().len(),
            view.source_len()
        );
        if !view.term().is_empty() {
            status.push_str(&format!(" | search:\"{}\"", view.term()));
        }
        let active: Vec<&str> = view.filters().active_columns().collect();
        if !active.is_empty() {
            status.push_str(&format!(" | filters:{}", active.join(",")));
        }
        if model.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT
            && !model.status_message().is_empty()
        {
            status.push_str(&format!(" | {}", model.status_message()));
        }
        frame.render_widget(Paragraph::new(status).dim(), area);
    }

    fn draw_filter_menu(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let Some(menu) = model.filter_menu() else {
            return;
        };
        let height = model.menu_view_height();
        let rend = std::cmp::min(menu.offset_row + height, menu.options.len());

        let mut lines = Vec::new();
        if menu.options.is_empty() {
            lines.push(Line::from("(no values)"));
        }
        for (idx, option) in menu.options[menu.offset_row..rend].iter().enumerate() {
            let mark = if model.view().filters().accepts(&menu.key, option) {
                "[x] "
            } else {
                "[ ] "
            };
            let mut line = Line::from(format!("{}{}", mark, option));
            if idx == menu.curser_row {
                line = line.style(Style::new().add_modifier(Modifier::REVERSED));
            }
            lines.push(line);
        }

        let widest = menu
            .options
            .iter()
            .map(|o| o.chars().count())
            .max()
            .unwrap_or(10);
        let popup = popup_area(area, widest as u16 + 8, lines.len() as u16 + 2);
        let block = Block::bordered()
            .title(format!(" Filter \"{}\" ", menu.key))
            .title_bottom(" Enter toggle | c clear | Esc close ");
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let lines = HELP_TEXT.lines().count() as u16;
        let popup = popup_area(area, 64, lines + 2);
        let block = Block::bordered().title(" Help ");
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(HELP_TEXT).block(block), popup);
    }
}

// Columns from the horizontal offset onward that fit the available width. The
// last column may render partially.
fn visible_columns(model: &Model, width: usize) -> Vec<usize> {
    let (_, offset_column) = model.offsets();
    let mut columns = Vec::new();
    let mut used = 0;
    for idx in offset_column..model.columns().len() {
        if used >= width {
            break;
        }
        columns.push(idx);
        used += model.column_widths()[idx];
    }
    columns
}

// Truncate to one below the column width and pad with spaces, so neighbouring
// columns always stay separated.
fn pad(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = std::cmp::min(width, area.width.saturating_sub(2));
    let height = std::cmp::min(height, area.height.saturating_sub(2));
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_truncates_and_separates() {
        assert_eq!(pad("abcdef", 4), "abc ");
        assert_eq!(pad("ab", 4), "ab  ");
    }

    #[test]
    fn popup_is_clamped_to_the_area() {
        let area = Rect::new(0, 0, 20, 10);
        let popup = popup_area(area, 100, 100);
        assert!(popup.width <= area.width);
        assert!(popup.height <= area.height);
    }
}
