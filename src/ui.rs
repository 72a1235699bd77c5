use std::sync::OnceLock;

use askbox_core::{Avatar, ChatRole};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use regex::Regex;

use crate::app::{App, ChatView, ViewItem};

/// Tallest the input box grows before it scrolls, in text lines
const MAX_INPUT_LINES: usize = 8;

/// Stand-in for an avatar graphic, which a terminal can't draw
const GRAPHIC_BADGE: &str = "🤓";

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(/?)(p|br|strong|em|ul|li)>").expect("tag pattern is valid"))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Builds styled lines out of message markup.
struct MarkupLines {
    base: Style,
    bold: bool,
    italic: bool,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl MarkupLines {
    fn new(base: Style) -> Self {
        Self {
            base,
            bold: false,
            italic: false,
            lines: Vec::new(),
            current: Vec::new(),
        }
    }

    fn break_line(&mut self, force: bool) {
        if force || !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let mut style = self.base;
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        self.current.push(Span::styled(unescape(raw), style));
    }

    fn tag(&mut self, open: bool, name: &str) {
        match (open, name) {
            (true, "p") => self.break_line(false),
            (false, "p") => {
                self.break_line(false);
                // blank line between paragraphs
                self.lines.push(Line::default());
            }
            (_, "br") => self.break_line(true),
            (_, "strong") => self.bold = open,
            (_, "em") => self.italic = open,
            (true, "li") => {
                self.break_line(false);
                self.current.push(Span::styled("  • ", self.base));
            }
            _ => self.break_line(false),
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.break_line(false);
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Turn the markup produced by `format_message` back into terminal lines:
/// paragraphs, line breaks, bold, italic and bullet lists.
pub fn markup_to_lines(markup: &str, base: Style) -> Vec<Line<'static>> {
    let mut out = MarkupLines::new(base);
    let mut last = 0;

    for caps in tag_pattern().captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        out.text(&markup[last..whole.start()]);
        out.tag(caps[1].is_empty(), &caps[2]);
        last = whole.end();
    }
    out.text(&markup[last..]);

    out.finish()
}

fn avatar_label(avatar: &Avatar) -> &str {
    match avatar {
        Avatar::Icon(icon) => icon,
        Avatar::Graphic(_) => GRAPHIC_BADGE,
    }
}

fn role_header(role: ChatRole, avatar: &Avatar) -> Line<'static> {
    let (name, color) = match role {
        ChatRole::User => ("You", Color::Cyan),
        ChatRole::Assistant => ("Assistant", Color::Yellow),
    };
    Line::from(vec![
        Span::raw(format!("{} ", avatar_label(avatar))),
        Span::styled(
            name,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ])
}

/// All transcript lines, top to bottom.
pub fn transcript_lines(view: &ChatView, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for item in &view.items {
        match item {
            ViewItem::Message(rendered) => {
                let message = &rendered.message;
                lines.push(role_header(message.role(), &rendered.avatar));
                let base = if message.is_error() {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                lines.extend(markup_to_lines(&rendered.markup, base));
                lines.push(Line::default());
            }
            ViewItem::Loading { avatar, .. } => {
                lines.push(role_header(ChatRole::Assistant, avatar));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::default());
            }
        }
    }

    lines
}

/// Rows the lines take once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| {
            // Use character count, not byte length, for proper UTF-8 handling
            let chars: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
            (chars / width + 1) as u16
        })
        .fold(0u16, |acc, h| acc.saturating_add(h))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let active = app.view().active_layout;
    if active {
        render_active(app, frame, body_area);
    } else {
        render_initial(app, frame, body_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let header = Line::from(vec![
        Span::styled(
            " askbox ",
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}", app.endpoint),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = "Enter send · Shift+Enter newline · PgUp/PgDn scroll · Esc quit";
    let footer = if app.controller.is_processing() {
        Line::from(vec![
            Span::styled(
                " Waiting for answer… ",
                Style::default().fg(Color::Black).bg(Color::Yellow),
            ),
            Span::styled(format!(" {}", hints), Style::default().fg(Color::DarkGray)),
        ])
    } else {
        Line::from(Span::styled(
            format!(" {}", hints),
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(footer), area);
}

fn input_height(view: &ChatView) -> u16 {
    let lines = view.input.split('\n').count().clamp(1, MAX_INPUT_LINES);
    lines as u16 + 2 // +2 for borders
}

/// Centered welcome text with the input box under it.
fn render_initial(app: &mut App, frame: &mut Frame, area: Rect) {
    let height = input_height(&app.view());
    let [column] = Layout::horizontal([Constraint::Percentage(70)])
        .flex(Flex::Center)
        .areas(area);
    let [title_area, input_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(height),
    ])
    .flex(Flex::Center)
    .areas(column);

    let title = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            "How can I help you today?",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Ask anything and press Enter.",
            Style::default().fg(Color::DarkGray),
        )),
    ]))
    .alignment(Alignment::Center);

    frame.render_widget(title, title_area);
    app.chat_area = None;
    render_input(app, frame, input_area);
}

/// Scrolling transcript with the input box pinned to the bottom.
fn render_active(app: &mut App, frame: &mut Frame, area: Rect) {
    let height = input_height(&app.view());
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(height),
    ])
    .areas(area);

    // Store for mouse hit-testing and page scrolling (inner size minus borders)
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    let inner_width = chat_area.width.saturating_sub(2);

    let frame_no = app.animation_frame;
    let (lines, scroll, total) = {
        let mut view = app.view();
        let lines = transcript_lines(&view, frame_no);
        let total = wrapped_height(&lines, inner_width);
        let max_scroll = total.saturating_sub(app.chat_height);
        if view.follow_bottom || view.scroll >= max_scroll {
            view.scroll = max_scroll;
            view.follow_bottom = true;
        }
        (lines, view.scroll, total)
    };

    let chat = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(chat, chat_area);

    if total > app.chat_height {
        let mut state = ScrollbarState::new(total.saturating_sub(app.chat_height) as usize)
            .position(scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            chat_area,
            &mut state,
        );
    }

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.view();
    let border_color = if !view.controls_enabled {
        Color::DarkGray
    } else if view.input_focused {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if view.controls_enabled { " Message " } else { " Message (waiting…) " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_line, cursor_col) = view.cursor_line_col();

    // Keep the cursor visible: scroll vertically by line, horizontally by column
    let first_line = (cursor_line + 1).saturating_sub(inner_height.max(1));
    let first_col = if inner_width == 0 || cursor_col < inner_width {
        0
    } else {
        cursor_col - inner_width + 1
    };

    let visible: Vec<Line> = view
        .input
        .split('\n')
        .skip(first_line)
        .take(inner_height)
        .map(|line| Line::from(line.chars().skip(first_col).take(inner_width).collect::<String>()))
        .collect();

    let text_style = if view.controls_enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    frame.render_widget(Paragraph::new(visible).style(text_style).block(block), area);

    if view.controls_enabled && view.input_focused {
        frame.set_cursor_position((
            area.x + 1 + (cursor_col - first_col) as u16,
            area.y + 1 + (cursor_line - first_line) as u16,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askbox_core::{format_message, AvatarStyle, ChatMessage, RenderedMessage};

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        let lines = markup_to_lines(&format_message("one\ntwo\n\nthree"), Style::default());
        assert_eq!(plain(&lines), vec!["one", "two", "", "three"]);
    }

    #[test]
    fn test_bold_and_italic_spans() {
        let lines = markup_to_lines(&format_message("**a** *b* c"), Style::default());
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        assert_eq!(spans[0].content, "a");
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans[2].content, "b");
        assert!(spans[2].style.add_modifier.contains(Modifier::ITALIC));
        assert!(!spans[3].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_bullets() {
        let lines = markup_to_lines(&format_message("Skills:\n- Rust\n- Go"), Style::default());
        assert_eq!(plain(&lines), vec!["Skills:", "  • Rust", "  • Go"]);
    }

    #[test]
    fn test_entities_shown_literally() {
        let lines = markup_to_lines(&format_message("<b> & \"q\" 'x' &amp;"), Style::default());
        assert_eq!(plain(&lines), vec!["<b> & \"q\" 'x' &amp;"]);
    }

    #[test]
    fn test_empty_markup() {
        assert!(markup_to_lines("", Style::default()).is_empty());
    }

    #[test]
    fn test_transcript_lines_show_loading_and_errors() {
        let mut view = ChatView::new(true);
        view.items.push(ViewItem::Message(RenderedMessage::new(
            ChatMessage::error("Sorry"),
            &AvatarStyle::graphic(),
        )));
        view.items.push(ViewItem::Loading {
            id: askbox_core::Transcript::new().push_loading().id(),
            avatar: AvatarStyle::graphic().avatar_for(ChatRole::Assistant),
        });

        let lines = transcript_lines(&view, 2);
        let text = plain(&lines);
        assert_eq!(text[0], format!("{} Assistant", GRAPHIC_BADGE));
        assert_eq!(text[1], "Sorry");
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Red));
        assert_eq!(text[4], "Thinking...");
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdef"), Line::default()];
        assert_eq!(wrapped_height(&lines, 4), 3);
    }
}
