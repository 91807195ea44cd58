#[derive(Debug, Clone, Default, PartialEq)]
struct FilterCriteria {
    keyword: Option<String>,
    min_date: Option<NaiveDate>,
}

impl FilterCriteria {
    fn matches(&self, item: &ResultItem) -> bool {
        let keyword_ok = match self.keyword.as_deref() {
            Some(keyword) if !keyword.is_empty() => item
                .title
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            _ => true,
        };
        // Items without a parsable date are excluded once a date filter is
        // active, rather than erroring out.
        let date_ok = match self.min_date {
            Some(min_date) => item.post_date_value().is_some_and(|date| date >= min_date),
            None => true,
        };
        keyword_ok && date_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageSlot {
    Number(usize),
    Ellipsis,
}

#[derive(Debug)]
struct PageView<'a> {
    rows: Vec<&'a ResultItem>,
    page: usize,
    total_pages: usize,
    filtered_len: usize,
    reported_total: usize,
    range_start: usize,
    range_end: usize,
    prev_enabled: bool,
    next_enabled: bool,
    slots: Vec<PageSlot>,
}

/// Owns the last-fetched result set and derives the visible page from a
/// filter → sort → slice pipeline, with no further network I/O.
#[derive(Debug)]
struct BrowseEngine {
    items: Vec<ResultItem>,
    reported_total: usize,
    filter: FilterCriteria,
    default_sort: SortKey,
    sort_key: SortKey,
    sort_direction: SortDirection,
    page: usize,
    page_size: usize,
    order: Vec<usize>,
}

impl BrowseEngine {
    fn new(page_size: usize, default_sort: SortKey) -> Self {
        Self {
            items: Vec::new(),
            reported_total: 0,
            filter: FilterCriteria::default(),
            default_sort,
            sort_key: default_sort,
            sort_direction: SortDirection::Desc,
            page: 1,
            page_size: page_size.max(1),
            order: Vec::new(),
        }
    }

    fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    fn filter(&self) -> &FilterCriteria {
        &self.filter
    }

    /// Replaces the working set wholesale and resets the whole view.
    fn set_result_set(&mut self, result_set: ResultSet) {
        self.items = result_set.items;
        self.reported_total = result_set.reported_total;
        self.filter = FilterCriteria::default();
        self.sort_key = self.default_sort;
        self.sort_direction = SortDirection::Desc;
        self.page = 1;
        self.rebuild();
    }

    fn apply_filter(&mut self, criteria: FilterCriteria) {
        self.filter = criteria;
        self.page = 1;
        self.rebuild();
    }

    /// Same key flips direction, a new key starts ascending.
    fn toggle_sort(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.sort_direction = self.sort_direction.toggle();
        } else {
            self.sort_key = key;
            self.sort_direction = SortDirection::Asc;
        }
        self.rebuild();
    }

    fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.sort_direction = direction;
        self.rebuild();
    }

    /// Clamps into the valid page range; used for programmatic jumps.
    fn go_to_page(&mut self, page: usize) {
        self.page = self.clamp_page(page);
    }

    /// Pagination-control semantics: the current page and out-of-range
    /// targets are ignored. Returns whether the page changed.
    fn select_page(&mut self, page: usize) -> bool {
        if page == 0 || page > self.total_pages() || page == self.page {
            return false;
        }
        self.page = page;
        true
    }

    fn total_pages(&self) -> usize {
        self.order.len().div_ceil(self.page_size).max(1)
    }

    fn clamp_page(&self, page: usize) -> usize {
        page.clamp(1, self.total_pages())
    }

    fn rebuild(&mut self) {
        let mut order: Vec<usize> = (0..self.items.len())
            .filter(|&index| self.filter.matches(&self.items[index]))
            .collect();
        let key = self.sort_key;
        let direction = self.sort_direction;
        let items = &self.items;
        // Stable sort: equal keys keep their relative order.
        order.sort_by(|&a, &b| {
            let ordering = compare_items(&items[a], &items[b], key);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        self.order = order;
        self.page = self.clamp_page(self.page);
    }

    fn page_view(&self) -> PageView<'_> {
        let total_pages = self.total_pages();
        let page = self.clamp_page(self.page);
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.order.len());
        let rows = if start < self.order.len() {
            self.order[start..end]
                .iter()
                .map(|&index| &self.items[index])
                .collect()
        } else {
            Vec::new()
        };
        PageView {
            page,
            total_pages,
            filtered_len: self.order.len(),
            reported_total: self.reported_total,
            range_start: if self.order.is_empty() { 0 } else { start + 1 },
            range_end: end,
            prev_enabled: page > 1,
            next_enabled: page < total_pages,
            slots: page_slots(page, total_pages),
            rows,
        }
    }
}

fn compare_items(a: &ResultItem, b: &ResultItem, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => compare_options(a.post_date_value(), b.post_date_value()),
        _ => compare_options(text_value(a, key), text_value(b, key)),
    }
}

fn text_value(item: &ResultItem, key: SortKey) -> Option<&str> {
    let raw = match key {
        SortKey::Date => item.post_date.as_str(),
        SortKey::Title => item.title.as_str(),
        SortKey::Agency => item.agency.as_str(),
        SortKey::Stage => item.stage.as_str(),
        SortKey::Status => item.status.as_str(),
    };
    if raw.is_empty() { None } else { Some(raw) }
}

// Missing values compare lowest, so they land at the start ascending and
// at the end descending.
fn compare_options<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

fn page_slots(current: usize, total_pages: usize) -> Vec<PageSlot> {
    const WINDOW: usize = 5;
    let start = current.saturating_sub(WINDOW / 2).max(1);
    let end = (start + WINDOW - 1).min(total_pages);
    let mut slots = Vec::new();
    if start > 1 {
        slots.push(PageSlot::Number(1));
        if start > 2 {
            slots.push(PageSlot::Ellipsis);
        }
    }
    for page in start..=end {
        slots.push(PageSlot::Number(page));
    }
    if end < total_pages {
        if end + 1 < total_pages {
            slots.push(PageSlot::Ellipsis);
        }
        slots.push(PageSlot::Number(total_pages));
    }
    slots
}
