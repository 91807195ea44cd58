const TICK_RATE: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Keyword,
    MinDate,
}

#[derive(Debug, Clone, PartialEq)]
struct ProgressView {
    current: u64,
    total: u64,
    message: Option<String>,
}

impl ProgressView {
    fn percent(&self) -> u16 {
        ((self.current.saturating_mul(100)) / self.total).min(100) as u16
    }
}

#[derive(Debug, Default)]
struct UiState {
    connected: bool,
    exhausted: bool,
    crawling: bool,
    fetching: bool,
    progress: Option<ProgressView>,
    crawl_status: Option<CrawlingStatus>,
    log: VecDeque<LogEntry>,
    banners: Vec<Banner>,
}

impl UiState {
    fn push_log(&mut self, entry: LogEntry) {
        self.log.push_back(entry);
        while self.log.len() > UI_LOG_CAPACITY {
            self.log.pop_front();
        }
    }

    fn push_banner(&mut self, kind: BannerKind, message: impl Into<String>, now: Instant) {
        self.banners.push(Banner {
            kind,
            message: message.into(),
            expires_at: now + BANNER_TTL,
        });
    }

    fn prune_banners(&mut self, now: Instant) {
        self.banners.retain(|banner| banner.expires_at > now);
    }

    fn active_banner(&self) -> Option<&Banner> {
        self.banners.last()
    }

    // Zero counts hide the indicator, same as a missing pair.
    fn apply_progress(&mut self, current: Option<u64>, total: Option<u64>, message: Option<String>) {
        self.progress = match (current, total) {
            (Some(current), Some(total)) if current > 0 && total > 0 => Some(ProgressView {
                current,
                total,
                message,
            }),
            _ => None,
        };
    }
}

/// Single dispatch point for everything the background tasks push at the
/// UI. Runs on the draw-loop thread, so sinks never race.
fn handle_ui_event(state: &mut UiState, engine: &mut BrowseEngine, event: UiEvent, now: Instant) {
    match event {
        UiEvent::ConnectionChanged(connected) => {
            state.connected = connected;
            state.push_log(LogEntry::info(if connected {
                "live feed connected"
            } else {
                "live feed disconnected"
            }));
        }
        UiEvent::Feed(StatusEvent::Status { message }) => {
            state.push_log(LogEntry::info(&*message));
            state.push_banner(BannerKind::Info, message, now);
        }
        UiEvent::Feed(StatusEvent::Error { message }) => {
            state.push_log(LogEntry::error(format!("error: {message}")));
            state.push_banner(BannerKind::Error, message, now);
        }
        UiEvent::Feed(StatusEvent::Progress {
            current,
            total,
            message,
        }) => state.apply_progress(current, total, message),
        UiEvent::Feed(StatusEvent::CrawlingStatus(status)) => {
            state.crawl_status = Some(status);
        }
        UiEvent::FeedDropped(reason) => {
            state.push_log(LogEntry::error(format!("dropped feed message: {reason}")));
        }
        UiEvent::FeedExhausted => {
            state.connected = false;
            state.exhausted = true;
            state.push_log(LogEntry::error(
                "live feed lost; restart bidwatch to reconnect",
            ));
            state.push_banner(
                BannerKind::Error,
                "live feed lost; restart bidwatch to reconnect",
                now,
            );
        }
        UiEvent::ResultsLoaded(result_set) => {
            state.fetching = false;
            state.push_log(LogEntry::info(format!(
                "loaded {} results (reported total {})",
                result_set.items.len(),
                result_set.reported_total
            )));
            engine.set_result_set(result_set);
        }
        UiEvent::FetchFailed(reason) => {
            state.fetching = false;
            state.push_log(LogEntry::error(format!(
                "result fetch failed, showing empty set: {reason}"
            )));
            engine.set_result_set(ResultSet::default());
        }
        UiEvent::ControlDone(action) => {
            match action {
                ControlAction::Start => state.crawling = true,
                ControlAction::Stop => state.crawling = false,
            }
            let message = format!("crawl {} accepted", action.label());
            state.push_log(LogEntry::info(&*message));
            state.push_banner(BannerKind::Info, message, now);
        }
        UiEvent::ControlFailed(action, reason) => {
            let message = format!("crawl {} failed: {reason}", action.label());
            state.push_log(LogEntry::error(&*message));
            state.push_banner(BannerKind::Error, message, now);
        }
    }
}

fn parse_filter_inputs(keyword: &str, min_date: &str) -> (FilterCriteria, Option<String>) {
    let keyword = keyword.trim();
    let keyword = if keyword.is_empty() {
        None
    } else {
        Some(keyword.to_string())
    };
    let (min_date, note) = if min_date.trim().is_empty() {
        (None, None)
    } else {
        match parse_post_date(min_date) {
            Some(date) => (Some(date), None),
            None => (
                None,
                Some(format!(
                    "ignoring unparsable minimum date `{}`",
                    min_date.trim()
                )),
            ),
        }
    };
    (FilterCriteria { keyword, min_date }, note)
}

fn run_tui(
    start_date: String,
    end_date: String,
    default_sort: SortKey,
    control_tx: UnboundedSender<ControlCommand>,
    rx: &mut UnboundedReceiver<UiEvent>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = draw_loop(
        &mut terminal,
        start_date,
        end_date,
        default_sort,
        control_tx,
        rx,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    start_date: String,
    end_date: String,
    default_sort: SortKey,
    control_tx: UnboundedSender<ControlCommand>,
    rx: &mut UnboundedReceiver<UiEvent>,
) -> io::Result<()> {
    let mut state = UiState::default();
    let mut engine = BrowseEngine::new(PAGE_SIZE, default_sort);
    let mut input_mode = InputMode::Normal;
    let mut keyword_input = String::new();
    let mut date_input = String::new();
    let mut table_state = TableState::default();
    let mut cursor = 0usize;
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        while let Ok(event) = rx.try_recv() {
            let resets_cursor =
                matches!(event, UiEvent::ResultsLoaded(_) | UiEvent::FetchFailed(_));
            handle_ui_event(&mut state, &mut engine, event, now);
            if resets_cursor {
                cursor = 0;
            }
        }
        state.prune_banners(now);

        let draw_result = terminal.draw(|frame| {
            draw_frame(
                frame,
                &state,
                &engine,
                input_mode,
                &keyword_input,
                &date_input,
                cursor,
                &mut table_state,
                &start_date,
                &end_date,
            );
        });
        // A failed draw keeps the previous frame on screen; the view state
        // is untouched.
        if let Err(err) = draw_result {
            warn!("render failed: {err}");
            state.push_log(LogEntry::error(format!("render failed: {err}")));
            state.push_banner(BannerKind::Error, format!("render failed: {err}"), now);
        }

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match input_mode {
                    InputMode::Keyword => match key.code {
                        KeyCode::Esc => input_mode = InputMode::Normal,
                        KeyCode::Enter => {
                            input_mode = InputMode::Normal;
                            apply_filter_inputs(
                                &mut engine,
                                &mut state,
                                &keyword_input,
                                &date_input,
                            );
                            cursor = 0;
                        }
                        KeyCode::Backspace => {
                            keyword_input.pop();
                        }
                        KeyCode::Char(ch) => keyword_input.push(ch),
                        _ => {}
                    },
                    InputMode::MinDate => match key.code {
                        KeyCode::Esc => input_mode = InputMode::Normal,
                        KeyCode::Enter => {
                            input_mode = InputMode::Normal;
                            apply_filter_inputs(
                                &mut engine,
                                &mut state,
                                &keyword_input,
                                &date_input,
                            );
                            cursor = 0;
                        }
                        KeyCode::Backspace => {
                            date_input.pop();
                        }
                        KeyCode::Char(ch) => date_input.push(ch),
                        _ => {}
                    },
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('s') => {
                            let _ = control_tx.send(ControlCommand::StartCrawl {
                                start_date: start_date.clone(),
                                end_date: end_date.clone(),
                            });
                        }
                        KeyCode::Char('x') => {
                            let _ = control_tx.send(ControlCommand::StopCrawl);
                        }
                        KeyCode::Char('f') => {
                            state.fetching = true;
                            let _ = control_tx.send(ControlCommand::FetchResults);
                        }
                        KeyCode::Char('/') => input_mode = InputMode::Keyword,
                        KeyCode::Char('d') => input_mode = InputMode::MinDate,
                        KeyCode::Char('c') => {
                            keyword_input.clear();
                            date_input.clear();
                            engine.set_sort(engine.default_sort, SortDirection::Desc);
                            engine.apply_filter(FilterCriteria::default());
                            cursor = 0;
                        }
                        KeyCode::Char(ch @ '1'..='5') => {
                            let key = match ch {
                                '1' => SortKey::Date,
                                '2' => SortKey::Title,
                                '3' => SortKey::Agency,
                                '4' => SortKey::Stage,
                                _ => SortKey::Status,
                            };
                            engine.toggle_sort(key);
                            cursor = 0;
                        }
                        KeyCode::Left | KeyCode::Char('h') => {
                            let page = engine.page_view().page;
                            if engine.select_page(page.saturating_sub(1)) {
                                cursor = 0;
                            }
                        }
                        KeyCode::Right | KeyCode::Char('l') => {
                            let page = engine.page_view().page;
                            if engine.select_page(page + 1) {
                                cursor = 0;
                            }
                        }
                        KeyCode::Home => {
                            engine.go_to_page(1);
                            cursor = 0;
                        }
                        KeyCode::End => {
                            engine.go_to_page(usize::MAX);
                            cursor = 0;
                        }
                        KeyCode::Up | KeyCode::Char('k') => cursor = cursor.saturating_sub(1),
                        KeyCode::Down | KeyCode::Char('j') => {
                            let rows = engine.page_view().rows.len();
                            if rows > 0 && cursor + 1 < rows {
                                cursor += 1;
                            }
                        }
                        KeyCode::Enter => open_selected(&engine, cursor, &mut state),
                        _ => {}
                    },
                }
            }
        }
        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

fn apply_filter_inputs(
    engine: &mut BrowseEngine,
    state: &mut UiState,
    keyword_input: &str,
    date_input: &str,
) {
    let (criteria, note) = parse_filter_inputs(keyword_input, date_input);
    if let Some(note) = note {
        state.push_log(LogEntry::error(note));
    }
    engine.apply_filter(criteria);
}

fn open_selected(engine: &BrowseEngine, cursor: usize, state: &mut UiState) {
    let url = {
        let view = engine.page_view();
        view.rows.get(cursor).map(|item| item.detail_url())
    };
    match url {
        Some(Some(url)) => match open_url_in_browser(&url) {
            Ok(()) => state.push_log(LogEntry::info(format!("opened {url}"))),
            Err(err) => state.push_log(LogEntry::error(format!("failed to open link: {err}"))),
        },
        Some(None) => state.push_log(LogEntry::info(
            "selected notice has no identifier; no detail link",
        )),
        None => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_frame(
    frame: &mut ratatui::Frame,
    state: &UiState,
    engine: &BrowseEngine,
    input_mode: InputMode,
    keyword_input: &str,
    date_input: &str,
    cursor: usize,
    table_state: &mut TableState,
    start_date: &str,
    end_date: &str,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], state, engine, start_date, end_date);
    draw_progress(frame, chunks[1], state);
    draw_results(frame, chunks[2], engine, cursor, table_state);
    draw_log(frame, chunks[3], state);
    draw_footer(frame, chunks[4], input_mode, keyword_input, date_input);

    if let Some(banner) = state.active_banner() {
        draw_banner(frame, banner);
    }
}

fn draw_header(
    frame: &mut ratatui::Frame,
    area: Rect,
    state: &UiState,
    engine: &BrowseEngine,
    start_date: &str,
    end_date: &str,
) {
    let metric_label = Style::default().fg(Color::Gray);
    let sep_style = Style::default().fg(Color::DarkGray);

    let indicator = if state.connected {
        Span::styled(
            "● live",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else if state.exhausted {
        Span::styled(
            "● gave up",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("● offline", Style::default().fg(Color::Red))
    };

    let crawl_span = if state.crawling {
        Span::styled("crawling", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("idle", Style::default().fg(Color::Gray))
    };

    let mut first = vec![
        indicator,
        Span::styled("  |  ", sep_style),
        Span::styled("Crawl ", metric_label),
        crawl_span,
        Span::styled("  |  ", sep_style),
        Span::styled("Window ", metric_label),
        Span::styled(
            format!("{start_date} → {end_date}"),
            Style::default().fg(Color::White),
        ),
        Span::styled("  |  ", sep_style),
        Span::styled("Results ", metric_label),
        Span::styled(
            engine.page_view().reported_total.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
    ];
    if state.fetching {
        first.push(Span::styled("  |  ", sep_style));
        first.push(Span::styled("fetching…", Style::default().fg(Color::Yellow)));
    }

    let second = match &state.crawl_status {
        Some(status) => Line::from(vec![
            Span::styled("Keyword ", metric_label),
            Span::styled(
                status.current_keyword.as_deref().unwrap_or("-").to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  |  ", sep_style),
            Span::styled("Processed ", metric_label),
            Span::styled(
                format!("{}/{}", status.processed_count, status.total_keywords),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled("  |  ", sep_style),
            Span::styled("Collected ", metric_label),
            Span::styled(
                status.total_results.to_string(),
                Style::default().fg(Color::LightCyan),
            ),
        ]),
        None => Line::from(Span::styled("no crawl status yet", metric_label)),
    };

    let header = Paragraph::new(vec![Line::from(first), second]).block(
        Block::default()
            .title("bidwatch · crawl control")
            .borders(Borders::ALL),
    );
    frame.render_widget(header, area);
}

fn draw_progress(frame: &mut ratatui::Frame, area: Rect, state: &UiState) {
    match &state.progress {
        Some(progress) => {
            let label = match &progress.message {
                Some(message) => {
                    format!("{}/{}  {message}", progress.current, progress.total)
                }
                None => format!("{}/{}", progress.current, progress.total),
            };
            let gauge = Gauge::default()
                .block(Block::default().title("Progress").borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Blue))
                .percent(progress.percent())
                .label(label);
            frame.render_widget(gauge, area);
        }
        None => {
            let idle = Paragraph::new(Span::styled(
                "no active progress",
                Style::default().fg(Color::DarkGray),
            ))
            .block(Block::default().title("Progress").borders(Borders::ALL));
            frame.render_widget(idle, area);
        }
    }
}

fn draw_results(
    frame: &mut ratatui::Frame,
    area: Rect,
    engine: &BrowseEngine,
    cursor: usize,
    table_state: &mut TableState,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(area);

    let view = engine.page_view();
    let filter = engine.filter();
    let mut title = format!(
        "Results · sort {} {}",
        engine.sort_key().label(),
        engine.sort_direction().label()
    );
    if let Some(keyword) = filter.keyword.as_deref() {
        title.push_str(&format!(" · title~\"{keyword}\""));
    }
    if let Some(min_date) = filter.min_date {
        title.push_str(&format!(" · date>={min_date}"));
    }

    let header = Row::new(vec![
        Cell::from("Link"),
        Cell::from("Title [2]"),
        Cell::from("Agency [3]"),
        Cell::from("Date [1]"),
        Cell::from("Stage [4]"),
        Cell::from("Status [5]"),
        Cell::from("Notice"),
        Cell::from("Qualification"),
    ])
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = if view.rows.is_empty() {
        vec![Row::new(vec![
            Cell::from(""),
            Cell::from(Span::styled(
                "no results",
                Style::default().fg(Color::DarkGray),
            )),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
        ])]
    } else {
        view.rows
            .iter()
            .map(|item| {
                let link = match item.detail_url() {
                    Some(_) => Span::styled("↗", Style::default().fg(Color::Blue)),
                    None => Span::styled("-", Style::default().fg(Color::DarkGray)),
                };
                Row::new(vec![
                    Cell::from(link),
                    Cell::from(dash_if_empty(&item.title)),
                    Cell::from(dash_if_empty(&item.agency)),
                    Cell::from(dash_if_empty(&item.post_date)),
                    Cell::from(dash_if_empty(&item.stage)),
                    Cell::from(dash_if_empty(&item.status)),
                    Cell::from(dash_if_empty(&item.notice)),
                    Cell::from(dash_if_empty(&item.qualification)),
                ])
            })
            .collect()
    };

    if view.rows.is_empty() {
        table_state.select(None);
    } else {
        table_state.select(Some(cursor.min(view.rows.len() - 1)));
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Percentage(28),
            Constraint::Percentage(14),
            Constraint::Length(10),
            Constraint::Percentage(10),
            Constraint::Percentage(10),
            Constraint::Percentage(16),
            Constraint::Percentage(14),
        ],
    )
    .header(header)
    .block(Block::default().title(title).borders(Borders::ALL))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_stateful_widget(table, sections[0], table_state);

    frame.render_widget(
        Paragraph::new(pagination_line(&view)).alignment(Alignment::Center),
        sections[1],
    );
}

fn pagination_line(view: &PageView<'_>) -> Line<'static> {
    let enabled = Style::default().fg(Color::White);
    let disabled = Style::default().fg(Color::DarkGray);
    let current = Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);

    let mut spans = vec![Span::styled(
        "◀ prev",
        if view.prev_enabled { enabled } else { disabled },
    )];
    spans.push(Span::raw("  "));
    for slot in &view.slots {
        match slot {
            PageSlot::Number(page) => {
                let style = if *page == view.page { current } else { enabled };
                spans.push(Span::styled(page.to_string(), style));
            }
            PageSlot::Ellipsis => spans.push(Span::styled("…", disabled)),
        }
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        "next ▶",
        if view.next_enabled { enabled } else { disabled },
    ));
    spans.push(Span::styled(
        if view.filtered_len == 0 {
            "   no rows".to_string()
        } else {
            format!(
                "   {}-{} of {} · page {}/{}",
                view.range_start, view.range_end, view.filtered_len, view.page, view.total_pages
            )
        },
        Style::default().fg(Color::Gray),
    ));
    Line::from(spans)
}

fn draw_log(frame: &mut ratatui::Frame, area: Rect, state: &UiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .rev()
        .take(visible.max(1))
        .map(|entry| {
            let style = match entry.level {
                LogLevel::Info => Style::default().fg(Color::Gray),
                LogLevel::Error => Style::default().fg(Color::Red),
            };
            Line::from(Span::styled(
                format!("[{}] {}", entry.at.format("%H:%M:%S"), entry.message),
                style,
            ))
        })
        .collect();
    let log = Paragraph::new(lines)
        .block(Block::default().title("Log").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(log, area);
}

fn draw_footer(
    frame: &mut ratatui::Frame,
    area: Rect,
    input_mode: InputMode,
    keyword_input: &str,
    date_input: &str,
) {
    let line = match input_mode {
        InputMode::Keyword => Line::from(vec![
            Span::styled("title filter: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{keyword_input}▏"),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (enter apply, esc cancel)", Style::default().fg(Color::Gray)),
        ]),
        InputMode::MinDate => Line::from(vec![
            Span::styled("minimum date (YYYY-MM-DD): ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{date_input}▏"),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (enter apply, esc cancel)", Style::default().fg(Color::Gray)),
        ]),
        InputMode::Normal => {
            let key_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
            let hint_style = Style::default().fg(Color::Gray);
            Line::from(vec![
                Span::styled("q", key_style),
                Span::styled(" quit  ", hint_style),
                Span::styled("s", key_style),
                Span::styled(" start  ", hint_style),
                Span::styled("x", key_style),
                Span::styled(" stop  ", hint_style),
                Span::styled("f", key_style),
                Span::styled(" fetch  ", hint_style),
                Span::styled("/", key_style),
                Span::styled(" filter  ", hint_style),
                Span::styled("d", key_style),
                Span::styled(" min-date  ", hint_style),
                Span::styled("c", key_style),
                Span::styled(" clear  ", hint_style),
                Span::styled("1-5", key_style),
                Span::styled(" sort  ", hint_style),
                Span::styled("←/→", key_style),
                Span::styled(" page  ", hint_style),
                Span::styled("home/end", key_style),
                Span::styled(" ends  ", hint_style),
                Span::styled("↑/↓", key_style),
                Span::styled(" row  ", hint_style),
                Span::styled("enter", key_style),
                Span::styled(" open link", hint_style),
            ])
        }
    };
    let footer = Paragraph::new(line)
        .block(Block::default().title("Keys").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, area);
}

fn draw_banner(frame: &mut ratatui::Frame, banner: &Banner) {
    let (title, style) = match banner.kind {
        BannerKind::Info => ("status", Style::default().fg(Color::Blue)),
        BannerKind::Error => ("error", Style::default().fg(Color::Red)),
    };
    let area = centered_rect(60, 18, frame.area());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(banner.message.clone())
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(style),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn dash_if_empty(text: &str) -> String {
    if text.trim().is_empty() {
        "-".to_string()
    } else {
        text.to_string()
    }
}
