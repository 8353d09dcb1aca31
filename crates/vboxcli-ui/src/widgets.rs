use crate::colors::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph,
        StatefulWidget, Widget, Wrap,
    },
};
use vboxcli_core::details::STATE_CAPTION;
use vboxcli_core::{Action, Block as DetailBlock, MachineTree, NodeKey, Section, Tone};

const EXPANDED_GLYPH: &str = "\u{25bc}";
const COLLAPSED_GLYPH: &str = "\u{25b6}";

/// Rect of at most `width` x `height` centred in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn popup_block<'a>(theme: &Theme, title: &'a str) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(theme.accent))
        .padding(Padding::uniform(1))
        .style(Style::default().fg(theme.fg).bg(theme.surface))
        .title(format!(" {title} "))
        .title_style(Style::default().fg(theme.accent).bold())
}

fn pane_block<'a>(theme: &Theme, title: &'a str) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().fg(theme.fg).bg(theme.surface))
        .title(format!(" {title} "))
        .title_style(Style::default().fg(theme.accent).bold())
}

/// Group/machine tree with the cursor row highlighted.
pub struct TreePane<'a> {
    pub tree: &'a MachineTree,
    pub theme: &'a Theme,
}

impl TreePane<'_> {
    fn item(&self, index: usize) -> Option<ListItem<'_>> {
        let row = self.tree.rows().get(index)?;
        let mut spans = vec![Span::raw("  ".repeat(row.depth))];

        match &row.key {
            NodeKey::Group(_) => {
                let glyph = if row.expanded {
                    EXPANDED_GLYPH
                } else {
                    COLLAPSED_GLYPH
                };
                spans.push(Span::styled(
                    format!("{glyph} "),
                    Style::default().fg(self.theme.muted),
                ));
                spans.push(Span::styled(self.tree.label(row), Style::default().bold()));
            }
            NodeKey::Machine { id, .. } => {
                let (icon, tone) = self
                    .tree
                    .inventory()
                    .machine(id)
                    .map_or(("?", vboxcli_core::StateTone::Error), |m| m.state.icon());
                spans.push(Span::styled(
                    format!("{icon} "),
                    Style::default().fg(self.theme.tone(tone)),
                ));
                spans.push(Span::raw(self.tree.label(row)));
            }
        }

        Some(ListItem::new(Line::from(spans)))
    }
}

impl Widget for TreePane<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let items: Vec<ListItem> = (0..self.tree.rows().len())
            .filter_map(|i| self.item(i))
            .collect();
        let list = List::new(items)
            .block(pane_block(self.theme, "Machines"))
            .highlight_style(self.theme.selected());
        let mut state = ListState::default().with_selected(Some(self.tree.cursor()));
        StatefulWidget::render(list, area, buf, &mut state);
    }
}

/// Detail report of the selected row.
pub struct DetailsPane<'a> {
    pub sections: &'a [Section],
    pub theme: &'a Theme,
    /// First visible line; clamped to the content when rendering.
    pub scroll: u16,
}

impl DetailsPane<'_> {
    fn lines(&self) -> Vec<Line<'static>> {
        let theme = self.theme;
        let label_style = Style::default().fg(theme.muted);
        let title_style = Style::default().fg(theme.accent).bold();
        let mut lines = Vec::new();

        for section in self.sections {
            match section {
                Section::Message { text, tone } => {
                    let style = match tone {
                        Tone::Normal => Style::default().fg(theme.muted),
                        Tone::Error => Style::default().fg(theme.error).bold(),
                    };
                    lines.push(Line::styled(text.clone(), style));
                }
                Section::State { icon, tone, text } => {
                    lines.push(Line::from(vec![
                        Span::styled(STATE_CAPTION, label_style),
                        Span::styled(format!("{icon} "), Style::default().fg(theme.tone(*tone))),
                        Span::styled(*text, Style::default().bold()),
                    ]));
                }
                Section::Group { title, blocks } => {
                    lines.push(Line::raw(""));
                    lines.push(Line::styled(title.clone(), title_style));
                    for block in blocks {
                        match block {
                            DetailBlock::Caption(text) => {
                                lines.push(Line::styled(format!("  {text}"), label_style.bold()));
                            }
                            DetailBlock::Fields(fields) => {
                                lines.extend(fields.rows.iter().map(|(label, value)| {
                                    Line::from(vec![
                                        Span::styled(fields.label_cell(label), label_style),
                                        Span::raw(" "),
                                        Span::raw(value.clone()),
                                    ])
                                }));
                            }
                        }
                    }
                }
                Section::Description(text) => {
                    lines.push(Line::raw(""));
                    lines.push(Line::styled("Description", title_style));
                    lines.extend(text.lines().map(|l| Line::raw(format!("  {l}"))));
                }
            }
        }
        lines
    }
}

impl DetailsPane<'_> {
    fn block(&self) -> Block<'static> {
        pane_block(self.theme, "Details").padding(Padding::horizontal(1))
    }

    fn paragraph(&self) -> Paragraph<'static> {
        Paragraph::new(self.lines()).wrap(Wrap { trim: false })
    }

    /// Largest useful scroll offset when rendered into `area`.
    pub fn max_scroll(&self, area: Rect) -> u16 {
        let inner = self.block().inner(area);
        if inner.width == 0 {
            return 0;
        }
        let total = self.paragraph().line_count(inner.width);
        let max = total.saturating_sub(usize::from(inner.height));
        u16::try_from(max).unwrap_or(u16::MAX)
    }
}

impl Widget for DetailsPane<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let scroll = self.scroll.min(self.max_scroll(area));
        self.paragraph()
            .block(self.block())
            .scroll((scroll, 0))
            .render(area, buf);
    }
}

pub struct Footer<'a> {
    pub theme: &'a Theme,
    pub busy: bool,
}

impl Widget for Footer<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(self.theme.border))
            .style(Style::default().bg(self.theme.surface));
        let inner = block.inner(area);
        block.render(area, buf);

        let keys: &[(&str, &str)] = if self.busy {
            &[("ESC", "Abort")]
        } else {
            &[
                ("\u{2191}\u{2193}", "Move"),
                ("\u{2190}\u{2192}", "Fold"),
                ("J/K", "Scroll"),
                ("S", "Start/Stop"),
                ("P", "Pause"),
                ("r", "Refresh"),
                ("R", "Reload"),
                ("?", "Help"),
                ("Q", "Quit"),
            ]
        };

        let key_style = self.theme.badge();
        let spans: Vec<Span> = keys
            .iter()
            .flat_map(|(key, desc)| {
                [
                    Span::styled(format!(" {key} "), key_style),
                    Span::styled(format!(" {desc}  "), Style::default().fg(self.theme.muted)),
                ]
            })
            .collect();

        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}

/// Single-button popup.
pub struct MessageDialog<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub theme: &'a Theme,
}

impl Widget for MessageDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = 60u16;
        let text_width = usize::from(width.saturating_sub(4)).max(1);
        let wrapped: usize = self
            .message
            .lines()
            .map(|l| l.chars().count().div_ceil(text_width).max(1))
            .sum();
        let height = u16::try_from(wrapped).unwrap_or(u16::MAX).saturating_add(6);

        let dialog = centered(area, width, height);
        Clear.render(dialog, buf);
        let block = popup_block(self.theme, self.title);
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let [text, button] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
        Paragraph::new(self.message)
            .wrap(Wrap { trim: true })
            .render(text, buf);
        Paragraph::new(Span::styled(" OK ", self.theme.badge()))
            .alignment(Alignment::Center)
            .render(button, buf);
    }
}

pub struct ConfirmDialog<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub theme: &'a Theme,
}

impl Widget for ConfirmDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dialog = centered(area, 50, 8);
        Clear.render(dialog, buf);
        let block = popup_block(self.theme, self.title).border_style(Style::default().fg(self.theme.paused));
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let [text, buttons] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
        Paragraph::new(self.message)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(text, buf);

        let line = Line::from(vec![
            Span::styled("[Y]", Style::default().fg(self.theme.running).bold()),
            Span::raw("es"),
            Span::raw("          "),
            Span::styled("[N]", Style::default().fg(self.theme.error).bold()),
            Span::raw("o"),
        ]);
        Paragraph::new(line)
            .alignment(Alignment::Center)
            .render(buttons, buf);
    }
}

/// Start or stop menu; each entry's accelerator is highlighted in its label.
pub struct ActionMenu<'a> {
    pub title: &'a str,
    pub actions: &'a [Action],
    pub selected: usize,
    pub theme: &'a Theme,
}

impl ActionMenu<'_> {
    fn entry(&self, action: Action) -> ListItem<'static> {
        let label = action.label();
        let shortcut = action.shortcut();
        let accel = Style::default()
            .fg(self.theme.accent)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);

        let line = match label.find(shortcut) {
            Some(at) => {
                let end = at + shortcut.len_utf8();
                Line::from(vec![
                    Span::raw(&label[..at]),
                    Span::styled(&label[at..end], accel),
                    Span::raw(&label[end..]),
                ])
            }
            None => Line::raw(label),
        };
        ListItem::new(line)
    }
}

impl Widget for ActionMenu<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = u16::try_from(self.actions.len()).unwrap_or(0).saturating_add(4);
        let dialog = centered(area, 32, height);
        Clear.render(dialog, buf);

        let items: Vec<ListItem> = self.actions.iter().map(|a| self.entry(*a)).collect();
        let list = List::new(items)
            .block(popup_block(self.theme, self.title).padding(Padding::horizontal(1)))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(self.selected));
        StatefulWidget::render(list, dialog, buf, &mut state);
    }
}

pub struct ProgressDialog<'a> {
    pub caption: &'a str,
    pub machine: &'a str,
    pub percent: u8,
    pub theme: &'a Theme,
}

impl Widget for ProgressDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dialog = centered(area, 56, 9);
        Clear.render(dialog, buf);
        let block = popup_block(self.theme, self.caption);
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let [name, gauge, hint] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .flex(Flex::SpaceBetween)
        .areas(inner);

        Paragraph::new(Line::styled(self.machine, Style::default().bold()))
            .alignment(Alignment::Center)
            .render(name, buf);
        Gauge::default()
            .gauge_style(Style::default().fg(self.theme.accent).bg(self.theme.selection))
            .percent(u16::from(self.percent.min(100)))
            .render(gauge, buf);
        Paragraph::new(Span::styled("Esc to abort", Style::default().fg(self.theme.muted)))
            .alignment(Alignment::Center)
            .render(hint, buf);
    }
}

pub struct HelpOverlay<'a> {
    pub theme: &'a Theme,
}

const HELP_KEYS: [(&str, &str); 14] = [
    ("\u{2191} k / \u{2193} j", "Move selection"),
    ("PgUp ^B / PgDn ^F", "Page up / down"),
    ("Home g / End G", "First / last row"),
    ("\u{2190} h / \u{2192} l", "Collapse / expand group"),
    ("Enter Space", "Toggle group"),
    ("J / K  ^D / ^U", "Scroll details line / page"),
    ("s", "Start or stop machine"),
    ("p", "Pause or resume machine"),
    ("r", "Refresh selected machine"),
    ("R", "Reload machine tree"),
    ("Esc ^C", "Abort running operation"),
    ("t", "Toggle theme"),
    ("q", "Quit"),
    ("?", "Close help"),
];

impl Widget for HelpOverlay<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = u16::try_from(HELP_KEYS.len()).unwrap_or(0).saturating_add(4);
        let dialog = centered(area, 56, height);
        Clear.render(dialog, buf);
        let block = popup_block(self.theme, "Help").border_type(BorderType::Plain);
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let key_style = self.theme.badge();
        let width = HELP_KEYS
            .iter()
            .map(|(keys, _)| keys.chars().count())
            .max()
            .unwrap_or_default();
        let lines: Vec<Line> = HELP_KEYS
            .iter()
            .map(|(keys, what)| {
                Line::from(vec![
                    Span::styled(format!(" {keys:<width$} "), key_style),
                    Span::raw(format!("  {what}")),
                ])
            })
            .collect();
        Paragraph::new(lines).render(inner, buf);
    }
}
