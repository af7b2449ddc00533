use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::RUVConfig;
use crate::model::{Model, UIData};

pub const CONTROLS_HEIGHT: usize = 3;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER_HEIGHT: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const VIEW_ALL_WIDTH: u16 = 10;
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug)]
pub struct TableUI {
    tick: usize,
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &RUVConfig) -> Self {
        Self {
            tick: 0,
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        self.tick = self.tick.wrapping_add(1);
        let uidata = model.get_uidata();

        let [controls, table, status] = Layout::vertical([
            Constraint::Length(CONTROLS_HEIGHT as u16),
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.render_controls(uidata, frame, controls);
        self.render_table(uidata, frame, table);
        self.render_statusline(uidata, frame, status);

        if uidata.loading {
            self.render_loading(uidata, frame, table);
        } else if let Some(error) = &uidata.error
            && uidata.table.iter().all(|c| c.data.is_empty())
            && uidata.filter.is_empty()
        {
            // Nothing to show at all, the error gets the whole attention
            self.render_error(error, frame, table);
        }

        if let Some(fields) = &uidata.dialog {
            self.render_dialog(fields, frame);
        }
        if uidata.show_popup {
            self.render_popup(&uidata.popup_message, frame);
        }
    }

    fn render_controls(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let filter_text = if uidata.active_cmdinput {
            uidata.cmdinput.input.clone()
        } else {
            uidata.filter.clone()
        };
        let mut spans = vec![" Filter: ".bold(), Span::raw(filter_text.clone())];
        let filter_width = 9 + filter_text.chars().count();
        let padding = 24usize.saturating_sub(filter_width);
        spans.push(Span::raw(" ".repeat(padding)));

        for (idx, (name, visible)) in uidata.columns.iter().enumerate() {
            let check = if *visible { "[x]" } else { "[ ]" };
            spans.push(Span::raw("  "));
            spans.push(format!("{}", idx + 1).blue().bold());
            spans.push(Span::raw(format!(" {check} {name}")));
        }

        let block = if uidata.active_cmdinput {
            Block::bordered().border_style(Style::new().yellow())
        } else {
            Block::bordered()
        };
        let paragraph = Paragraph::new(Line::from(spans)).block(block);
        frame.render_widget(paragraph, area);

        if uidata.active_cmdinput {
            let x = area.x + 1 + 9 + uidata.cmdinput.curser_pos as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
        }
    }

    fn render_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            uidata
                .table
                .iter()
                .enumerate()
                .map(|(cidx, c)| {
                    let cell = Cell::from(c.name.clone());
                    if cidx == uidata.selected_column {
                        cell.style(Style::new().add_modifier(Modifier::REVERSED))
                    } else {
                        cell
                    }
                })
                .chain(std::iter::once(Cell::from("View All"))),
        )
        .style(Style::new().bold().fg(Color::Yellow));

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            let row = Row::new(
                uidata
                    .table
                    .iter()
                    .map(|c| Cell::from(c.data[ridx].clone()))
                    .chain(std::iter::once(Cell::from(Span::raw("<Enter>").blue()))),
            );
            if ridx == uidata.selected_row {
                row.style(Style::new().add_modifier(Modifier::REVERSED))
            } else {
                row
            }
        });

        let widths: Vec<Constraint> = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width.min(self.max_column_width) as u16))
            .chain(std::iter::once(Constraint::Length(VIEW_ALL_WIDTH)))
            .collect();

        let title = Line::from(format!(" {} ", uidata.name).bold());
        let instructions = Line::from(vec![
            " Next page ".into(),
            "<n>".blue().bold(),
            " Sort ".into(),
            "<s>".blue().bold(),
            " Filter ".into(),
            "</>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let table = Table::new(rows, widths).header(header).block(block).column_spacing(1);
        frame.render_widget(table, area);
    }

    fn render_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let first = uidata.page_index * uidata.page_size + 1;
        let last = std::cmp::min((uidata.page_index + 1) * uidata.page_size, uidata.total_records);
        let next = if uidata.page_index + 1 >= uidata.page_count {
            "last page".dark_gray()
        } else if uidata.next_page_ready {
            "next ready".green()
        } else {
            "next loading".yellow()
        };

        let mut spans = vec![
            format!(" rows {first}-{last} of {} ", uidata.total_records).into(),
            "· ".dark_gray(),
            format!("page {}/{} ", uidata.page_index + 1, uidata.page_count).into(),
            "· ".dark_gray(),
            next,
            " · ".dark_gray(),
            format!(
                "row {}/{} ",
                (uidata.abs_selected_row + 1).min(uidata.nrows),
                uidata.nrows
            )
            .into(),
            "· ".dark_gray(),
        ];
        match &uidata.error {
            Some(error) => spans.push(error.clone().red().bold()),
            None => spans.push(uidata.status_message.clone().into()),
        }
        let paragraph = Paragraph::new(Line::from(spans));
        frame.render_widget(paragraph, area);
    }

    fn render_loading(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let spinner = SPINNER[(self.tick / 2) % SPINNER.len()];
        let text = format!("Loading page {} {spinner}", uidata.page_index + 1);
        let area = popup_area(area, 40, 3);
        frame.render_widget(Clear, area);
        let paragraph = Paragraph::new(text)
            .centered()
            .block(Block::bordered());
        frame.render_widget(paragraph, area);
    }

    fn render_error(&self, error: &str, frame: &mut Frame, area: Rect) {
        let area = popup_area(area, 60, 5);
        frame.render_widget(Clear, area);
        let text = Text::from(vec![
            Line::from(error.to_string().red()),
            Line::from(vec!["Press ".into(), "<r>".blue().bold(), " to retry".into()]),
        ]);
        let paragraph = Paragraph::new(text)
            .centered()
            .wrap(Wrap { trim: true })
            .block(Block::bordered().title(" Error ".red().bold()));
        frame.render_widget(paragraph, area);
    }

    fn render_dialog(&self, fields: &[(String, String)], frame: &mut Frame) {
        let area = popup_area(frame.area(), 70, fields.len() as u16 + 2);
        frame.render_widget(Clear, area);
        let lines: Vec<Line> = fields
            .iter()
            .map(|(label, value)| {
                Line::from(vec![format!("{label}: ").bold(), Span::raw(value.clone())])
            })
            .collect();
        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(" User Information ".bold())
                    .title_bottom(
                        Line::from(vec![" Close ".into(), "<Esc> ".blue().bold()]).centered(),
                    )
                    .border_set(border::DOUBLE),
            );
        frame.render_widget(paragraph, area);
    }

    fn render_popup(&self, message: &str, frame: &mut Frame) {
        let height = message.lines().count() as u16 + 2;
        let area = popup_area(frame.area(), 60, height);
        frame.render_widget(Clear, area);
        let paragraph = Paragraph::new(message.to_string())
            .block(Block::bordered().title(" Help ".bold()));
        frame.render_widget(paragraph, area);
    }
}

fn popup_area(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
