pub async fn run() -> io::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let base = Url::parse(&cli.server).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid server URL `{}`: {err}", cli.server),
        )
    })?;
    let feed = feed_url(&base, &cli.ws_path).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid feed path `{}`: {err}", cli.ws_path),
        )
    })?;
    let policy = RetryPolicy {
        max_attempts: cli.max_reconnect_attempts,
        delay: Duration::from_millis(cli.reconnect_delay_ms),
    };
    let (start_date, end_date) = crawl_window(&cli);
    let default_sort = SortKey::from_label(&cli.sort);
    info!(
        "bidwatch starting against {base} (feed {feed}, window {start_date}..{end_date})"
    );

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<ControlCommand>();
    let api = ApiClient::new(base);
    let feed_handle = tokio::spawn(feed_loop(feed, policy, ui_tx.clone()));
    let worker_handle = tokio::spawn(control_worker(api, control_rx, ui_tx));

    let result = if cli.no_tui {
        drop(control_tx);
        run_headless(&mut ui_rx)
    } else {
        run_tui(start_date, end_date, default_sort, control_tx, &mut ui_rx)
    };

    feed_handle.abort();
    worker_handle.abort();
    result
}

fn init_tracing(log_file: Option<&str>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

// Default crawl window: the last month, like the service's own form.
fn crawl_window(cli: &Cli) -> (String, String) {
    let today = Local::now().date_naive();
    let start = cli.start_date.clone().unwrap_or_else(|| {
        today
            .checked_sub_months(Months::new(1))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string()
    });
    let end = cli
        .end_date
        .clone()
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    (start, end)
}

async fn control_worker(
    api: ApiClient,
    mut rx: UnboundedReceiver<ControlCommand>,
    tx: UnboundedSender<UiEvent>,
) {
    while let Some(command) = rx.recv().await {
        let event = match command {
            ControlCommand::StartCrawl {
                start_date,
                end_date,
            } => match api.start_crawl(&start_date, &end_date).await {
                Ok(()) => UiEvent::ControlDone(ControlAction::Start),
                Err(err) => UiEvent::ControlFailed(ControlAction::Start, err.to_string()),
            },
            ControlCommand::StopCrawl => match api.stop_crawl().await {
                Ok(()) => UiEvent::ControlDone(ControlAction::Stop),
                Err(err) => UiEvent::ControlFailed(ControlAction::Stop, err.to_string()),
            },
            ControlCommand::FetchResults => match api.fetch_results().await {
                Ok(result_set) => UiEvent::ResultsLoaded(result_set),
                Err(err) => UiEvent::FetchFailed(err.to_string()),
            },
        };
        let _ = tx.send(event);
    }
}

// Feed tail for terminals without TUI support; mirrors what the log pane
// would show.
fn run_headless(rx: &mut UnboundedReceiver<UiEvent>) -> io::Result<()> {
    loop {
        loop {
            match rx.try_recv() {
                Ok(UiEvent::ConnectionChanged(connected)) => {
                    eprintln!(
                        "live feed {}",
                        if connected { "connected" } else { "disconnected" }
                    );
                }
                Ok(UiEvent::Feed(StatusEvent::Status { message })) => eprintln!("{message}"),
                Ok(UiEvent::Feed(StatusEvent::Error { message })) => {
                    eprintln!("error: {message}")
                }
                Ok(UiEvent::Feed(StatusEvent::Progress {
                    current: Some(current),
                    total: Some(total),
                    message,
                })) if current > 0 && total > 0 => {
                    eprintln!(
                        "progress {current}/{total} {}",
                        message.unwrap_or_default()
                    );
                }
                Ok(UiEvent::Feed(StatusEvent::Progress { .. })) => {}
                Ok(UiEvent::Feed(StatusEvent::CrawlingStatus(status))) => {
                    eprintln!(
                        "crawling keyword={} processed={}/{} collected={}",
                        status.current_keyword.as_deref().unwrap_or("-"),
                        status.processed_count,
                        status.total_keywords,
                        status.total_results
                    );
                }
                Ok(UiEvent::FeedDropped(reason)) => eprintln!("dropped feed message: {reason}"),
                Ok(UiEvent::FeedExhausted) => {
                    eprintln!("live feed lost; giving up");
                    return Ok(());
                }
                Ok(_) => {}
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return Ok(()),
            }
        }
        std::thread::sleep(Duration::from_millis(120));
    }
}

#[cfg(test)]
mod runtime_tests {
    use super::*;

    #[test]
    fn crawl_window_prefers_explicit_dates() {
        let mut cli = Cli::parse_from(["bidwatch"]);
        cli.start_date = Some("2026-01-01".to_string());
        cli.end_date = Some("2026-02-01".to_string());
        assert_eq!(
            crawl_window(&cli),
            ("2026-01-01".to_string(), "2026-02-01".to_string())
        );
    }

    #[test]
    fn crawl_window_defaults_to_the_last_month() {
        let cli = Cli::parse_from(["bidwatch"]);
        let (start, end) = crawl_window(&cli);
        let start = NaiveDate::parse_from_str(&start, "%Y-%m-%d").unwrap();
        let end = NaiveDate::parse_from_str(&end, "%Y-%m-%d").unwrap();
        assert!(start < end);
        assert_eq!(end, Local::now().date_naive());
    }

    #[test]
    fn cli_defaults_cover_the_whole_surface() {
        let cli = Cli::parse_from(["bidwatch"]);
        assert_eq!(cli.server, "http://127.0.0.1:8000");
        assert_eq!(cli.ws_path, "/ws");
        assert_eq!(cli.max_reconnect_attempts, 5);
        assert_eq!(cli.reconnect_delay_ms, 3000);
        assert_eq!(cli.sort, "date");
        assert!(!cli.no_tui);
    }
}
