use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::domain::CMDMode;
use crate::export::ExportScope;
use crate::model::{ExportDialog, Model, Status};
use crate::render::DisplayModel;

pub const CMDLINE_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
const STATUS_MESSAGE_FADE: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [table_area, status_area] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(CMDLINE_HEIGHT)])
                .areas(frame.area());

        self.draw_table(model, frame, table_area);
        self.draw_statusline(model, frame, status_area);

        if let Some(dialog) = model.export_dialog() {
            self.draw_export_dialog(dialog, frame);
        }
        if let Some(text) = model.popup() {
            self.draw_popup(text, frame);
        }
    }

    /// Widths fit the visible page, and the summary lines while those are shown.
    fn column_widths(model: &Model) -> Vec<Constraint> {
        let display: &DisplayModel = model.display();
        let summaries = model.summaries().unwrap_or_default();
        (0..display.headers.len())
            .map(|idx| {
                let summary_width = summaries
                    .get(idx)
                    .and_then(|s| s.lines.iter().map(|l| l.chars().count()).max())
                    .unwrap_or(0);
                let width = display.column_width(idx).max(summary_width);
                let width = width.min(model.max_column_width()) + COLUMN_WIDTH_MARGIN;
                Constraint::Length(width as u16)
            })
            .collect()
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let display = model.display();
        let widths = Self::column_widths(model);

        let block = Block::bordered()
            .title(model.title())
            .title_bottom(Line::from(display.page_info.clone()).right_aligned());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let table_area = match model.summaries() {
            Some(summaries) => {
                let height = summaries.iter().map(|s| s.lines.len()).max().unwrap_or(1) as u16;
                let [summary_area, table_area] =
                    Layout::vertical([Constraint::Length(height + 1), Constraint::Min(1)])
                        .areas(inner);
                let cells = summaries.iter().map(|s| Cell::from(s.text()));
                let summary = Table::new([Row::new(cells).height(height)], widths.clone())
                    .style(Style::new().fg(Color::DarkGray));
                frame.render_widget(summary, summary_area);
                table_area
            }
            None => inner,
        };

        let header = Row::new(display.headers.iter().map(|h| Cell::from(h.as_str())))
            .style(Style::new().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));

        let mut state = TableState::default();
        let rows: Vec<Row> = match &display.placeholder {
            Some(placeholder) => {
                let text = if model.status == Status::LOADING {
                    "Loading ..."
                } else {
                    placeholder.as_str()
                };
                vec![Row::new([Cell::from(text)]).style(Style::new().fg(Color::DarkGray))]
            }
            None => {
                let (row, column) = model.selection();
                state = state.with_selected(Some(row)).with_selected_column(Some(column));
                display
                    .rows
                    .iter()
                    .map(|r| Row::new(r.iter().map(|c| Cell::from(one_line(c)))))
                    .collect()
            }
        };

        let table = Table::new(rows, widths)
            .header(header)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        frame.render_stateful_widget(table, table_area, &mut state);
    }

    fn draw_statusline(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        if let Some((mode, input)) = model.cmd_input().filter(|_| model.raw_keyevents()) {
            let prompt = match mode {
                CMDMode::SearchTable => "/".to_string(),
                CMDMode::SearchInColumn => {
                    let (_, column) = model.selection();
                    let name = model.display().headers.get(column).cloned().unwrap_or_default();
                    format!("{name}/")
                }
            };
            let cursor_x = area.x + (prompt.chars().count() + input.cursor_pos) as u16;
            let line = Line::from(vec![
                Span::styled(prompt, Style::new().fg(Color::Cyan)),
                Span::raw(input.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let style = if model.status_message_age() > STATUS_MESSAGE_FADE {
            Style::new().fg(Color::DarkGray)
        } else {
            Style::new()
        };
        let line = Line::from(vec![
            Span::styled(model.status_message().to_string(), style),
            Span::styled("  (? help)", Style::new().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_export_dialog(&mut self, dialog: &ExportDialog, frame: &mut Frame) {
        let mut lines: Vec<Line> = vec![Line::from("Columns (space toggles)"), Line::from("")];
        for (idx, (name, on)) in dialog.columns.iter().enumerate() {
            let mark = if *on { "[x]" } else { "[ ]" };
            let style = if idx == dialog.cursor {
                Style::new().add_modifier(Modifier::REVERSED)
            } else {
                Style::new()
            };
            lines.push(Line::styled(format!("{mark} {name}"), style));
        }
        let scope = match dialog.scope {
            ExportScope::View => "filtered rows only",
            ExportScope::Dataset => "all rows",
        };
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Rows: {scope} (f toggles)")));
        lines.push(Line::from("Enter writes the file, Esc cancels"));

        let height = lines.len() as u16 + 2;
        let width = lines.iter().map(|l| l.width()).max().unwrap_or(20) as u16 + 4;
        let area = centered(frame.area(), width, height);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(Text::from(lines)).block(Block::bordered().title(" Export ")),
            area,
        );
    }

    fn draw_popup(&mut self, text: &str, frame: &mut Frame) {
        let height = text.lines().count() as u16 + 2;
        let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(20) as u16 + 4;
        let area = centered(frame.area(), width, height);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text).block(Block::bordered().title(" Help ")),
            area,
        );
    }
}

fn one_line(cell: &str) -> String {
    cell.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LexiconConfig, Message};
    use crate::parser::parse;
    use crate::source::Fetched;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 16)).unwrap();
        let mut ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn model() -> Model {
        let mut model = Model::with_clipboard(&LexiconConfig::default(), None);
        model.apply_fetch(Ok(Fetched {
            parsed: parse("Word,Meaning\nalaga,care\nlungkot,\n"),
            version: 1,
            duration: Duration::ZERO,
        }));
        model
    }

    #[test]
    fn draws_rows_and_page_info() {
        let screen = screen(&model());
        assert!(screen.contains("Meaning"));
        assert!(screen.contains("alaga"));
        assert!(screen.contains("Page 1 of 1"));
        assert!(screen.contains("2 rows"));
    }

    #[test]
    fn draws_summary_and_dialogs() {
        let mut model = model();
        model.update(Message::ToggleSummary);
        assert!(screen(&model).contains("Null Values: 1"));

        model.update(Message::Export);
        let s = screen(&model);
        assert!(s.contains("[x] Word"));
        assert!(s.contains("filtered rows only"));
    }
}
