fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    area
}

// Callers only pass URLs built by `ResultItem::detail_url`, which are never
// blank.
fn open_url_in_browser(url: &str) -> io::Result<()> {
    browser_command(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
}

#[cfg(target_os = "macos")]
fn browser_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn browser_command(url: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
fn browser_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}

#[cfg(test)]
mod ui_utils_tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside_its_parent() {
        let parent = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 20, parent);
        assert!(popup.x >= parent.x && popup.y >= parent.y);
        assert!(popup.x + popup.width <= parent.width);
        assert!(popup.y + popup.height <= parent.height);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 8);
        assert_eq!(popup.x, 20);
        assert_eq!(popup.y, 16);
    }

    #[test]
    fn browser_command_targets_the_url() {
        let url = "https://www.g2b.go.kr:8081/ep/invitation/publish/bidInfoDtl.do?bidno=1";
        let command = browser_command(url);
        let args: Vec<_> = command.get_args().collect();
        assert!(args.iter().any(|arg| *arg == url));
    }
}
