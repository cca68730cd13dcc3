use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use tracing::{debug, info};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::{Comment, Envelope, Post};
use crate::comments::{self, CommentBlock, PostsAndComments, ReplyBlocked, SelectionChange};
use crate::data::{CommentService, MediaService, PostService};
use crate::status::{Outcome, Severity, StatusLine, Ticket};
use crate::tabs::{Tab, TabController};
use crate::upload::{self, Field, SubmitBlocked, UploadForm};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const INPUT_CURSOR: &str = "▏";
const FIELD_LABEL_WIDTH: usize = 12;

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CommentsPane {
    Posts,
    Comments,
}

enum AsyncResponse {
    Upload {
        ticket: Ticket,
        result: Envelope,
    },
    Posts {
        ticket: Ticket,
        result: Envelope<Vec<Post>>,
    },
    Comments {
        ticket: Ticket,
        request_id: u64,
        media_id: String,
        result: Envelope<Vec<Comment>>,
    },
    Reply {
        ticket: Ticket,
        comment_id: String,
        generation: u64,
        result: Envelope,
    },
}

#[derive(Clone)]
pub struct Options {
    pub status_message: String,
    pub initial_tab: Tab,
    pub backend_label: String,
    pub media_service: Arc<dyn MediaService + Send + Sync>,
    pub post_service: Arc<dyn PostService + Send + Sync>,
    pub comment_service: Arc<dyn CommentService + Send + Sync>,
}

pub struct Model {
    status: StatusLine,
    tabs: TabController,
    upload: UploadForm,
    feed: PostsAndComments,
    comments_focus: CommentsPane,
    backend_label: String,
    media_service: Arc<dyn MediaService + Send + Sync>,
    post_service: Arc<dyn PostService + Send + Sync>,
    comment_service: Arc<dyn CommentService + Send + Sync>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    needs_redraw: bool,
    spinner: Spinner,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            status: StatusLine::new(opts.status_message),
            tabs: TabController::new(opts.initial_tab),
            upload: UploadForm::new(),
            feed: PostsAndComments::new(),
            comments_focus: CommentsPane::Posts,
            backend_label: opts.backend_label,
            media_service: opts.media_service,
            post_service: opts.post_service,
            comment_service: opts.comment_service,
            response_tx,
            response_rx,
            needs_redraw: true,
            spinner: Spinner::new(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.status.is_pending() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Upload { ticket, result } => {
                let outcome = self.upload.finish(&result);
                info!(success = result.is_success(), "upload finished");
                self.complete(ticket, outcome);
            }
            AsyncResponse::Posts { ticket, result } => {
                let outcome = self.feed.finish_fetch_posts(&result);
                self.complete(ticket, outcome);
            }
            AsyncResponse::Comments {
                ticket,
                request_id,
                media_id,
                result,
            } => {
                if let Some(outcome) = self.feed.finish_comments(request_id, &media_id, result) {
                    self.complete(ticket, outcome);
                }
            }
            AsyncResponse::Reply {
                ticket,
                comment_id,
                generation,
                result,
            } => {
                let outcome = self.feed.finish_reply(&comment_id, generation, &result);
                info!(comment_id = %comment_id, success = result.is_success(), "reply finished");
                self.complete(ticket, outcome);
            }
        }
        self.mark_dirty();
    }

    fn complete(&mut self, ticket: Ticket, outcome: Outcome) {
        self.status
            .complete(ticket, outcome.message, outcome.severity);
    }

    fn select_tab(&mut self, tab: Tab) {
        if self.tabs.select(tab) {
            debug!(tab = tab.title(), "tab selected");
        }
    }

    fn submit_upload(&mut self) {
        let request = match self.upload.begin_submit() {
            Ok(request) => request,
            Err(SubmitBlocked::InFlight) => return,
            Err(err) => {
                self.status.report(err.to_string(), Severity::Error);
                return;
            }
        };
        let ticket = self.status.begin(upload::STARTED_MESSAGE, Severity::Info);
        info!(media_type = request.media_type.as_str(), "upload submitted");

        let tx = self.response_tx.clone();
        let service = self.media_service.clone();
        thread::spawn(move || {
            let result = service.upload(&request);
            let _ = tx.send(AsyncResponse::Upload { ticket, result });
        });
    }

    fn fetch_posts(&mut self) {
        if !self.feed.begin_fetch_posts() {
            return;
        }
        let ticket = self
            .status
            .begin(comments::FETCHING_POSTS_MESSAGE, Severity::Info);

        let tx = self.response_tx.clone();
        let service = self.post_service.clone();
        thread::spawn(move || {
            let result = service.list_posts();
            let _ = tx.send(AsyncResponse::Posts { ticket, result });
        });
    }

    fn commit_post_selection(&mut self) {
        match self.feed.commit_selection() {
            SelectionChange::Unchanged | SelectionChange::Cleared => {}
            SelectionChange::Fetch {
                request_id,
                media_id,
            } => {
                let ticket = self
                    .status
                    .begin(comments::FETCHING_COMMENTS_MESSAGE, Severity::Info);
                debug!(request_id, media_id = %media_id, "loading comments");

                let tx = self.response_tx.clone();
                let service = self.comment_service.clone();
                thread::spawn(move || {
                    let result = service.list_comments(&media_id);
                    let _ = tx.send(AsyncResponse::Comments {
                        ticket,
                        request_id,
                        media_id,
                        result,
                    });
                });
            }
        }
    }

    fn submit_focused_reply(&mut self) {
        let Some(comment_id) = self.feed.focused_comment_id().map(str::to_string) else {
            return;
        };
        self.submit_reply(&comment_id);
    }

    /// One dispatch for every reply form, whichever comment it hangs off.
    fn submit_reply(&mut self, comment_id: &str) {
        let request = match self.feed.begin_reply(comment_id) {
            Ok(request) => request,
            Err(ReplyBlocked::InFlight) => return,
            Err(err) => {
                self.status.report(err.to_string(), Severity::Error);
                return;
            }
        };
        let ticket = self
            .status
            .begin(comments::SENDING_REPLY_MESSAGE, Severity::Info);

        let tx = self.response_tx.clone();
        let service = self.comment_service.clone();
        thread::spawn(move || {
            let result = service.reply(&request.comment_id, &request.message);
            let _ = tx.send(AsyncResponse::Reply {
                ticket,
                comment_id: request.comment_id,
                generation: request.generation,
                result,
            });
        });
    }

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => return true,
            KeyCode::Esc => return true,
            KeyCode::F(1) => self.select_tab(Tab::Upload),
            KeyCode::F(2) => self.select_tab(Tab::Comments),
            KeyCode::Char('t') | KeyCode::Right if ctrl => {
                self.tabs.next();
            }
            KeyCode::Left if ctrl => {
                self.tabs.previous();
            }
            _ if ctrl => {}
            _ => match self.tabs.active() {
                Tab::Upload => self.handle_upload_key(key.code),
                Tab::Comments => match self.comments_focus {
                    CommentsPane::Posts => self.handle_posts_key(key.code),
                    CommentsPane::Comments => self.handle_comments_key(key.code),
                },
            },
        }
        self.mark_dirty();
        false
    }

    fn handle_upload_key(&mut self, code: KeyCode) {
        let on_selector = self.upload.focus() == Field::MediaType;
        match code {
            KeyCode::Tab | KeyCode::Down => self.upload.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.upload.focus_previous(),
            KeyCode::Left if on_selector => self.upload.cycle_media_type(-1),
            KeyCode::Right | KeyCode::Char(' ') if on_selector => {
                self.upload.cycle_media_type(1)
            }
            KeyCode::Enter => self.submit_upload(),
            KeyCode::Backspace => self.upload.backspace(),
            KeyCode::Delete => self.upload.clear_active(),
            KeyCode::Char(ch) if !ch.is_control() => self.upload.insert_char(ch),
            _ => {}
        }
    }

    fn handle_posts_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.feed.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.feed.move_cursor(1),
            KeyCode::PageUp => self.feed.move_cursor(-10),
            KeyCode::PageDown => self.feed.move_cursor(10),
            KeyCode::Enter => self.commit_post_selection(),
            KeyCode::Char('r') | KeyCode::F(5) => self.fetch_posts(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Right => {
                self.comments_focus = CommentsPane::Comments;
            }
            _ => {}
        }
    }

    fn handle_comments_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left => {
                self.comments_focus = CommentsPane::Posts;
            }
            KeyCode::Up => self.feed.move_comment_cursor(-1),
            KeyCode::Down => self.feed.move_comment_cursor(1),
            KeyCode::F(5) => self.fetch_posts(),
            KeyCode::Enter => self.submit_focused_reply(),
            KeyCode::Backspace => {
                if let Some(input) = self.focused_reply_input() {
                    input.pop();
                }
            }
            KeyCode::Delete => {
                if let Some(input) = self.focused_reply_input() {
                    input.clear();
                }
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                if let Some(input) = self.focused_reply_input() {
                    input.push(ch);
                }
            }
            _ => {}
        }
    }

    fn focused_reply_input(&mut self) -> Option<&mut String> {
        let comment_id = self.feed.focused_comment_id()?.to_string();
        self.feed.reply_input_mut(&comment_id)
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        self.draw_tabs(frame, layout[0]);
        self.draw_status(frame, layout[1]);

        match self.tabs.active() {
            Tab::Upload => self.draw_upload(frame, layout[2]),
            Tab::Comments => {
                let panes = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                    .split(layout[2]);
                self.draw_posts(frame, panes[0]);
                self.draw_comments(frame, panes[1]);
            }
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);
    }

    fn draw_tabs(&self, frame: &mut Frame<'_>, area: Rect) {
        let titles: Vec<Line> = Tab::ALL
            .iter()
            .enumerate()
            .map(|(idx, tab)| {
                let marker = if self.tabs.is_active(*tab) { "●" } else { "○" };
                Line::from(format!("{marker} {} [F{}]", tab.title(), idx + 1))
            })
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.tabs.active().index())
            .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG))
            .highlight_style(
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
            .divider(Span::raw("│"));
        frame.render_widget(tabs, area);
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let color = severity_color(self.status.severity());
        let status_text = if self.status.is_pending() {
            format!("{} {}", self.spinner.frame(), self.status.message())
                .trim()
                .to_string()
        } else {
            self.status.message().to_string()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(color)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, area);
    }

    fn pane_block(&self, title: &'static str, focused: bool) -> Block<'static> {
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1))
    }

    fn draw_upload(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block("Upload media", true);
        let inner = block.inner(area);
        let value_width = (inner.width as usize).saturating_sub(FIELD_LABEL_WIDTH + 1);
        let submitting = self.upload.is_submitting();

        let mut lines: Vec<Line<'static>> = Vec::new();
        for field in self.upload.visible_fields() {
            let focused = self.upload.focus() == field;
            let line = match field {
                Field::MediaType => {
                    let value = format!("◀ {} ▶", self.upload.media_type().as_str());
                    field_line(field.title(), value, focused, submitting)
                }
                Field::MediaUrl => field_line(
                    field.title(),
                    input_display(self.upload.media_url(), "(required)", focused, value_width),
                    focused,
                    submitting,
                ),
                Field::Caption => field_line(
                    field.title(),
                    input_display(self.upload.caption(), "(optional)", focused, value_width),
                    focused,
                    submitting,
                ),
                Field::Submit => {
                    lines.push(Line::from(""));
                    let label = if submitting {
                        "[ Uploading… ]".to_string()
                    } else {
                        "[ Upload ]".to_string()
                    };
                    button_line(label, focused, submitting)
                }
            };
            lines.push(line);
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            format!("Backend: {}", self.backend_label),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_posts(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.comments_focus == CommentsPane::Posts;
        let block = self.pane_block("Posts", focused);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        let fetching = self.feed.is_fetching_posts();
        let button = if fetching {
            "[ Fetching posts… ]".to_string()
        } else {
            "[ Fetch posts (r) ]".to_string()
        };
        let mut lines = vec![button_line(button, false, fetching), Line::from("")];

        let header = lines.len();
        let visible = (inner.height as usize).saturating_sub(header).max(1);
        let cursor = self.feed.cursor();
        let start = cursor.saturating_sub(visible.saturating_sub(1));
        let selected = self.feed.selected();

        for (idx, option) in self
            .feed
            .options()
            .iter()
            .enumerate()
            .skip(start)
            .take(visible)
        {
            let is_cursor = idx == cursor;
            let is_selected = option.value.is_some() && option.value.as_deref() == selected;
            let marker = if is_selected { "● " } else { "  " };
            let mut style = Style::default().fg(if option.value.is_some() {
                COLOR_TEXT_PRIMARY
            } else {
                COLOR_TEXT_SECONDARY
            });
            if is_cursor && focused {
                style = style
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD);
            } else if is_cursor {
                style = style.bg(COLOR_PANEL_FOCUSED_BG);
            }
            let text = fit_width(&format!("{marker}{}", option.label), width);
            lines.push(Line::from(Span::styled(text, style)));
        }

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.comments_focus == CommentsPane::Comments;
        let block = self.pane_block("Comments", focused);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let height = inner.height as usize;

        // Blocks stay on screen until a new selection replaces them, even
        // after the post list is refreshed.
        let placeholder = if self.feed.is_fetching_comments() {
            Some("Loading comments…")
        } else if !self.feed.blocks().is_empty() {
            None
        } else if self.feed.selected().is_none() {
            Some("Select a post to load its comments.")
        } else {
            Some("No comments to show.")
        };
        if let Some(message) = placeholder {
            let paragraph = Paragraph::new(message)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let cursor = self.feed.comment_cursor();
        let rendered: Vec<Vec<Line<'static>>> = self
            .feed
            .blocks()
            .iter()
            .enumerate()
            .map(|(idx, entry)| comment_lines(entry, width, focused && idx == cursor))
            .collect();

        // Walk back from the focused comment until the pane is full.
        let mut start = cursor.min(rendered.len().saturating_sub(1));
        let mut used = rendered.get(start).map(Vec::len).unwrap_or(0);
        while start > 0 && used + rendered[start - 1].len() <= height {
            start -= 1;
            used += rendered[start].len();
        }

        let lines: Vec<Line<'static>> = rendered.into_iter().skip(start).flatten().collect();
        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn footer_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self.tabs.active() {
            Tab::Upload => {
                parts.push("Tab/↑↓ move between fields".to_string());
                if self.upload.focus() == Field::MediaType {
                    parts.push("←/→ change media type".to_string());
                }
                parts.push("Enter upload".to_string());
                parts.push("Del clear field".to_string());
            }
            Tab::Comments => match self.comments_focus {
                CommentsPane::Posts => {
                    parts.push("r fetch posts".to_string());
                    parts.push("j/k move, Enter select".to_string());
                    parts.push("Tab go to comments".to_string());
                }
                CommentsPane::Comments => {
                    if self.feed.any_reply_in_flight() {
                        parts.push("Replies sending".to_string());
                    }
                    if self.feed.blocks().is_empty() {
                        parts.push("No comments yet".to_string());
                    } else {
                        parts.push("↑/↓ choose comment, type to reply, Enter send".to_string());
                    }
                    parts.push("Tab back to posts".to_string());
                }
            },
        }
        parts.push("F1/F2 or Ctrl+←/→ switch tab".to_string());
        parts.push("Esc quit".to_string());
        parts.join(" · ")
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => COLOR_ACCENT,
        Severity::Success => COLOR_SUCCESS,
        Severity::Error => COLOR_ERROR,
    }
}

fn field_line(label: &str, value: String, focused: bool, dimmed: bool) -> Line<'static> {
    let label_style = if focused {
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY)
    };
    let mut value_style = Style::default().fg(if dimmed {
        COLOR_TEXT_SECONDARY
    } else {
        COLOR_TEXT_PRIMARY
    });
    if focused {
        value_style = value_style.bg(COLOR_PANEL_FOCUSED_BG);
    }
    Line::from(vec![
        Span::styled(format!("{label:<FIELD_LABEL_WIDTH$} "), label_style),
        Span::styled(value, value_style),
    ])
}

fn button_line(label: String, focused: bool, disabled: bool) -> Line<'static> {
    Line::from(button_span(label, focused, disabled))
}

fn button_span(label: String, focused: bool, disabled: bool) -> Span<'static> {
    let style = if disabled {
        Style::default()
            .fg(COLOR_TEXT_SECONDARY)
            .add_modifier(Modifier::DIM)
    } else if focused {
        Style::default()
            .fg(COLOR_BG)
            .bg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_ACCENT)
    };
    Span::styled(label, style)
}

/// Current input text as shown in a single row: the tail is kept so the
/// cursor stays visible.
fn input_display(value: &str, placeholder: &str, focused: bool, width: usize) -> String {
    if value.is_empty() && !focused {
        return placeholder.to_string();
    }
    let cursor = if focused { INPUT_CURSOR } else { "" };
    let budget = width.saturating_sub(UnicodeWidthStr::width(cursor)).max(1);
    let mut tail: Vec<char> = Vec::new();
    let mut used = 0;
    for ch in value.chars().rev() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        tail.push(ch);
    }
    let visible: String = tail.into_iter().rev().collect();
    format!("{visible}{cursor}")
}

fn fit_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

fn comment_lines(entry: &CommentBlock, width: usize, highlight: bool) -> Vec<Line<'static>> {
    let background = if highlight {
        COLOR_PANEL_SELECTED_BG
    } else {
        COLOR_PANEL_BG
    };
    let meta_style = Style::default()
        .fg(COLOR_ACCENT)
        .bg(background)
        .add_modifier(Modifier::BOLD);
    let body_style = Style::default().fg(COLOR_TEXT_PRIMARY).bg(background);

    let mut lines = vec![Line::from(Span::styled(
        format!("@{}", entry.comment.username),
        meta_style,
    ))];
    for row in wrap(&entry.comment.text, width.max(1)) {
        lines.push(Line::from(Span::styled(row.into_owned(), body_style)));
    }

    let reply = &entry.reply;
    let button = if reply.submitting {
        "[Sending…]"
    } else {
        "[Reply]"
    };
    let prefix = "↳ ";
    let input_width = width
        .saturating_sub(UnicodeWidthStr::width(prefix) + UnicodeWidthStr::width(button) + 1);
    let input = input_display(&reply.input, "write a reply…", highlight, input_width);
    let input_style = if highlight {
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .bg(COLOR_PANEL_FOCUSED_BG)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY).bg(background)
    };
    lines.push(Line::from(vec![
        Span::styled(prefix, Style::default().fg(COLOR_TEXT_SECONDARY).bg(background)),
        Span::styled(input, input_style),
        Span::raw(" "),
        button_span(button.to_string(), highlight, reply.submitting),
    ]));
    lines.push(Line::from(""));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MediaType, Status, UploadRequest};
    use parking_lot::Mutex;
    use ratatui::backend::TestBackend;

    #[derive(Default)]
    struct Scripted {
        posts: Mutex<Option<Envelope<Vec<Post>>>>,
        comments: Mutex<Option<Envelope<Vec<Comment>>>>,
        reply: Mutex<Option<Envelope>>,
        upload: Mutex<Option<Envelope>>,
        calls: Mutex<Vec<String>>,
    }

    impl MediaService for Scripted {
        fn upload(&self, request: &UploadRequest) -> Envelope {
            self.calls.lock().push(format!("upload:{}", request.media_url));
            self.upload
                .lock()
                .take()
                .unwrap_or_else(|| Envelope::error("unscripted"))
        }
    }

    impl PostService for Scripted {
        fn list_posts(&self) -> Envelope<Vec<Post>> {
            self.calls.lock().push("posts".into());
            self.posts
                .lock()
                .take()
                .unwrap_or_else(|| Envelope::error("unscripted"))
        }
    }

    impl CommentService for Scripted {
        fn list_comments(&self, media_id: &str) -> Envelope<Vec<Comment>> {
            self.calls.lock().push(format!("comments:{media_id}"));
            self.comments
                .lock()
                .take()
                .unwrap_or_else(|| Envelope::error("unscripted"))
        }

        fn reply(&self, comment_id: &str, message: &str) -> Envelope {
            self.calls.lock().push(format!("reply:{comment_id}:{message}"));
            self.reply
                .lock()
                .take()
                .unwrap_or_else(|| Envelope::error("unscripted"))
        }
    }

    fn model(backend: Arc<Scripted>) -> Model {
        Model::new(Options {
            status_message: "ready".into(),
            initial_tab: Tab::Upload,
            backend_label: "test".into(),
            media_service: backend.clone(),
            post_service: backend.clone(),
            comment_service: backend,
        })
    }

    fn settle(model: &mut Model) {
        let message = model
            .response_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("async response");
        model.handle_async_response(message);
    }

    fn screen(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("test terminal");
        terminal.draw(|frame| model.draw(frame)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            model.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            username: format!("user_{id}"),
            text: "hello".into(),
        }
    }

    fn model_with_comments(backend: &Arc<Scripted>) -> Model {
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::F(2)));
        *backend.posts.lock() = Some(Envelope::success("ok").with_data(vec![Post {
            id: "1".into(),
            media_type: "image".into(),
            caption: None,
        }]));
        model.handle_key(key(KeyCode::Char('r')));
        settle(&mut model);

        *backend.comments.lock() =
            Some(Envelope::success("ok").with_data(vec![comment("c1"), comment("c2")]));
        model.handle_key(key(KeyCode::Down));
        model.handle_key(key(KeyCode::Enter));
        settle(&mut model);
        model.handle_key(key(KeyCode::Tab));
        model
    }

    #[test]
    fn upload_success_resets_form() {
        let backend = Arc::new(Scripted::default());
        *backend.upload.lock() = Some(Envelope::success("Reel published."));
        let mut model = model(backend.clone());

        model.handle_key(key(KeyCode::Left));
        assert_eq!(model.upload.media_type(), MediaType::Reel);
        model.handle_key(key(KeyCode::Down));
        type_text(&mut model, "https://cdn.example/a.mp4");
        model.handle_key(key(KeyCode::Enter));

        assert!(model.upload.is_submitting());
        assert_eq!(model.status.message(), upload::STARTED_MESSAGE);
        assert_eq!(model.status.severity(), Severity::Info);

        settle(&mut model);
        assert!(!model.upload.is_submitting());
        assert_eq!(model.upload.media_url(), "");
        assert_eq!(model.status.message(), "Reel published.");
        assert_eq!(model.status.severity(), Severity::Success);
        assert_eq!(
            backend.calls.lock().as_slice(),
            ["upload:https://cdn.example/a.mp4".to_string()]
        );
    }

    #[test]
    fn upload_failure_keeps_fields() {
        let backend = Arc::new(Scripted::default());
        *backend.upload.lock() = Some(Envelope::error("network error: fetch failed"));
        let mut model = model(backend);
        model.handle_key(key(KeyCode::Down));
        type_text(&mut model, "https://cdn.example/b.jpg");
        model.handle_key(key(KeyCode::Enter));
        settle(&mut model);

        assert!(!model.upload.is_submitting());
        assert_eq!(model.upload.media_url(), "https://cdn.example/b.jpg");
        assert_eq!(model.status.message(), "Error: network error: fetch failed");
        assert_eq!(model.status.severity(), Severity::Error);
    }

    #[test]
    fn empty_url_never_reaches_backend() {
        let backend = Arc::new(Scripted::default());
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::Enter));
        assert_eq!(model.status.severity(), Severity::Error);
        assert!(backend.calls.lock().is_empty());
        assert!(model.response_rx.is_empty());
    }

    #[test]
    fn switching_tabs_issues_no_request() {
        let backend = Arc::new(Scripted::default());
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::F(2)));
        model.handle_key(KeyEvent::new(KeyCode::Char('t'), KeyModifiers::CONTROL));
        model.handle_key(key(KeyCode::F(2)));
        assert_eq!(model.tabs.active(), Tab::Comments);
        model.handle_key(KeyEvent::new(KeyCode::Left, KeyModifiers::CONTROL));
        assert_eq!(model.tabs.active(), Tab::Upload);
        model.handle_key(KeyEvent::new(KeyCode::Right, KeyModifiers::CONTROL));
        assert_eq!(model.tabs.active(), Tab::Comments);
        assert!(backend.calls.lock().is_empty());
    }

    #[test]
    fn fetch_posts_renders_placeholder_and_options() {
        let backend = Arc::new(Scripted::default());
        *backend.posts.lock() = Some(Envelope::success("ok").with_data(vec![Post {
            id: "1".into(),
            media_type: "image".into(),
            caption: None,
        }]));
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::F(2)));
        model.handle_key(key(KeyCode::Char('r')));
        assert_eq!(model.status.message(), comments::FETCHING_POSTS_MESSAGE);
        settle(&mut model);

        let labels: Vec<_> = model
            .feed
            .options()
            .iter()
            .map(|o| o.label.clone())
            .collect();
        assert_eq!(
            labels,
            vec![comments::PLACEHOLDER_LABEL.to_string(), "image: no caption".into()]
        );
        assert_eq!(model.status.severity(), Severity::Success);
        assert_eq!(backend.calls.lock().as_slice(), ["posts".to_string()]);
    }

    #[test]
    fn placeholder_selection_clears_without_request() {
        let backend = Arc::new(Scripted::default());
        let mut model = model_with_comments(&backend);
        assert_eq!(model.feed.blocks().len(), 2);
        let calls_before = backend.calls.lock().len();

        model.handle_key(key(KeyCode::Tab));
        model.handle_key(key(KeyCode::Up));
        model.handle_key(key(KeyCode::Enter));
        assert!(model.feed.blocks().is_empty());
        assert_eq!(backend.calls.lock().len(), calls_before);
        assert!(model.response_rx.is_empty());
    }

    #[test]
    fn empty_comments_are_info() {
        let backend = Arc::new(Scripted::default());
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::F(2)));
        *backend.posts.lock() = Some(Envelope::success("ok").with_data(vec![Post {
            id: "1".into(),
            media_type: "image".into(),
            caption: None,
        }]));
        model.handle_key(key(KeyCode::Char('r')));
        settle(&mut model);
        *backend.comments.lock() = Some(Envelope::success("ok").with_data(Vec::new()));
        model.handle_key(key(KeyCode::Down));
        model.handle_key(key(KeyCode::Enter));
        settle(&mut model);

        assert!(model.feed.blocks().is_empty());
        assert_eq!(model.status.severity(), Severity::Info);
        assert!(backend.calls.lock().contains(&"comments:1".to_string()));
    }

    #[test]
    fn reply_clears_only_its_own_input() {
        let backend = Arc::new(Scripted::default());
        let mut model = model_with_comments(&backend);
        type_text(&mut model, "first");
        model.handle_key(key(KeyCode::Down));
        type_text(&mut model, "second");

        *backend.reply.lock() = Some(Envelope::success("sent"));
        model.handle_key(key(KeyCode::Enter));
        assert!(model.feed.blocks()[1].reply.submitting);
        assert_eq!(model.status.message(), comments::SENDING_REPLY_MESSAGE);
        settle(&mut model);

        assert_eq!(model.status.message(), "sent");
        assert_eq!(model.status.severity(), Severity::Success);
        assert_eq!(model.feed.blocks()[1].reply.input, "");
        assert!(!model.feed.blocks()[1].reply.submitting);
        assert_eq!(model.feed.blocks()[0].reply.input, "first");
        assert!(backend
            .calls
            .lock()
            .contains(&"reply:c2:second".to_string()));
    }

    #[test]
    fn stale_status_does_not_stomp_newer_operation() {
        let backend = Arc::new(Scripted::default());
        let mut model = model_with_comments(&backend);
        type_text(&mut model, "hi");
        *backend.reply.lock() = Some(Envelope {
            status: Status::Error,
            message: Some("slow failure".into()),
            data: None,
        });
        model.handle_key(key(KeyCode::Enter));
        // A second operation starts before the reply lands.
        *backend.posts.lock() = Some(Envelope::success("ok").with_data(Vec::new()));
        model.handle_key(key(KeyCode::F(5)));

        settle(&mut model);
        settle(&mut model);
        assert_eq!(model.status.message(), "ok");
        assert_eq!(model.status.severity(), Severity::Info);
        assert!(!model.feed.any_reply_in_flight());
        assert_eq!(model.feed.blocks()[0].reply.input, "hi");
    }

    #[test]
    fn input_display_keeps_tail_visible() {
        assert_eq!(input_display("", "(required)", false, 10), "(required)");
        assert_eq!(input_display("abcdef", "", true, 4), "def▏");
        assert_eq!(input_display("abc", "", false, 10), "abc");
    }

    #[test]
    fn fit_width_truncates_with_ellipsis() {
        assert_eq!(fit_width("short", 10), "short");
        assert_eq!(fit_width("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn refreshing_posts_keeps_comments_visible() {
        let backend = Arc::new(Scripted::default());
        let mut model = model_with_comments(&backend);
        assert!(screen(&model).contains("@user_c1"));

        model.handle_key(key(KeyCode::Tab));
        *backend.posts.lock() = Some(Envelope::success("ok").with_data(vec![Post {
            id: "2".into(),
            media_type: "video".into(),
            caption: Some("new".into()),
        }]));
        model.handle_key(key(KeyCode::Char('r')));
        settle(&mut model);
        assert_eq!(model.feed.selected(), None);
        assert_eq!(model.feed.blocks().len(), 2);

        let drawn = screen(&model);
        assert!(drawn.contains("@user_c1"), "screen was {drawn}");
        assert!(!drawn.contains("Select a post to load its comments."));

        // The reply goes to the comment that is on screen.
        model.handle_key(key(KeyCode::Tab));
        type_text(&mut model, "hi");
        *backend.reply.lock() = Some(Envelope::success("sent"));
        model.handle_key(key(KeyCode::Enter));
        settle(&mut model);
        assert!(backend.calls.lock().contains(&"reply:c1:hi".to_string()));
    }

    #[test]
    fn spinner_only_while_shown_operation_runs() {
        let backend = Arc::new(Scripted::default());
        let mut model = model(backend.clone());
        model.handle_key(key(KeyCode::F(2)));
        assert!(!model.status.is_pending());

        *backend.posts.lock() = Some(Envelope::success("ok").with_data(Vec::new()));
        model.handle_key(key(KeyCode::Char('r')));
        assert!(model.status.is_pending());
        assert!(screen(&model).contains(model.spinner.frame()));

        settle(&mut model);
        assert!(!model.status.is_pending());
        let drawn = screen(&model);
        assert!(!SPINNER_FRAMES.iter().any(|frame| drawn.contains(frame)));
    }
}
