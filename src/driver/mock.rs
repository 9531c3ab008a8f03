//! In-memory listing site
//!
//! `MockListingSite` implements `BrowserDriver` over a simulated results
//! page: result counters exposed as attributes, a collapsible region filter,
//! listing elements, and both pagination controls. Failures can be scripted
//! per strategy so the crawler's recovery paths can be exercised without a
//! browser.

use crate::config::Config;
use crate::driver::{
    BrowserDriver, DriverError, DriverResult, ShutdownTrigger, CLICK_SCRIPT,
    SCROLL_INTO_VIEW_SCRIPT,
};
use crate::state::PaginationStrategy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// One listing on the simulated site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockJob {
    pub id: String,
    /// A listing without a title cannot be extracted
    pub title: Option<String>,
    pub department: String,
    pub location: String,
    pub url: String,
}

impl MockJob {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: Some(format!("Position {}", id)),
            department: "Nursing".to_string(),
            location: "Sacramento, CA".to_string(),
            url: format!("https://jobs.example.com/job/{}", id),
        }
    }

    /// A listing whose title element is missing
    pub fn broken(id: &str) -> Self {
        Self {
            title: None,
            ..Self::new(id)
        }
    }
}

/// Builds `count` well-formed listings with ids `{prefix}-{n}`
pub fn numbered_jobs(prefix: &str, count: usize) -> Vec<MockJob> {
    (1..=count)
        .map(|n| MockJob::new(&format!("{}-{}", prefix, n)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Department,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Results,
    Toggle,
    FilterOption,
    Control(PaginationStrategy),
    Listing(usize),
    Field(usize, Field),
}

/// Element handle issued by `MockListingSite`
///
/// Handles are tied to the document generation they were found in and turn
/// stale after a navigation or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    node: Node,
    generation: u64,
}

#[derive(Debug, Clone)]
struct Selectors {
    results: String,
    total_results: String,
    current_page: String,
    total_pages: String,
    toggle: String,
    expanded_class: String,
    option: String,
    item: String,
    title: String,
    department: String,
    location: String,
    id_attribute: String,
    url_attribute: String,
    expand_in_place: String,
    next_link: String,
}

impl Selectors {
    fn from_config(config: &Config) -> Self {
        Self {
            results: config.site.results_selector.clone(),
            total_results: config.site.total_results_attribute.clone(),
            current_page: config.site.current_page_attribute.clone(),
            total_pages: config.site.total_pages_attribute.clone(),
            toggle: config.filter.toggle_selector.clone(),
            expanded_class: config.filter.expanded_class.clone(),
            option: config.filter.option_selector.clone(),
            item: config.listing.item_selector.clone(),
            title: config.listing.title_selector.clone(),
            department: config.listing.department_selector.clone(),
            location: config.listing.location_selector.clone(),
            id_attribute: config.listing.id_attribute.clone(),
            url_attribute: config.listing.url_attribute.clone(),
            expand_in_place: config.pagination.expand_in_place.selector.clone(),
            next_link: config.pagination.next_link.selector.clone(),
        }
    }
}

#[derive(Debug)]
struct SiteState {
    jobs: Vec<MockJob>,
    page_size: usize,
    unfiltered_total: Option<u32>,
    total_pages: Option<u32>,
    filter_effective: bool,
    filter_expanded: bool,
    filter_applied: bool,
    loaded: bool,
    closed: bool,
    generation: u64,
    current_page: u32,
    cumulative: bool,
    unavailable: Vec<PaginationStrategy>,
    ignored_clicks: HashMap<PaginationStrategy, u32>,
    stale_clicks: u32,
    close_on_click: Option<PaginationStrategy>,
    interrupt_on_page: Option<(u32, ShutdownTrigger)>,
    panic_on_page: Option<u32>,
    clicks: HashMap<PaginationStrategy, u32>,
    toggle_clicks: u32,
    refreshes: u32,
    navigations: Vec<String>,
}

impl SiteState {
    fn filtered_total(&self) -> u32 {
        self.jobs.len() as u32
    }

    fn unfiltered_total(&self) -> u32 {
        self.unfiltered_total
            .unwrap_or_else(|| self.filtered_total() * 4 + 1)
    }

    fn shown_total(&self) -> u32 {
        if self.filter_applied && self.filter_effective {
            self.filtered_total()
        } else {
            self.unfiltered_total()
        }
    }

    fn total_pages(&self) -> u32 {
        self.total_pages.unwrap_or_else(|| {
            let size = self.page_size.max(1);
            (self.jobs.len().div_ceil(size) as u32).max(1)
        })
    }

    fn visible_listings(&self) -> std::ops::Range<usize> {
        let page = self.current_page as usize;
        let end = (page * self.page_size).min(self.jobs.len());
        let start = if self.cumulative {
            0
        } else {
            ((page - 1) * self.page_size).min(end)
        };
        start..end
    }

    fn control_present(&self, strategy: PaginationStrategy) -> bool {
        !self.unavailable.contains(&strategy) && self.current_page < self.total_pages()
    }
}

/// Simulated listing site that answers the crawler's selectors
pub struct MockListingSite {
    selectors: Selectors,
    state: Mutex<SiteState>,
}

impl MockListingSite {
    /// Creates a site showing `jobs` after filtering, `page_size` per page
    pub fn new(config: &Config, jobs: Vec<MockJob>, page_size: usize) -> Self {
        Self {
            selectors: Selectors::from_config(config),
            state: Mutex::new(SiteState {
                jobs,
                page_size: page_size.max(1),
                unfiltered_total: None,
                total_pages: None,
                filter_effective: true,
                filter_expanded: false,
                filter_applied: false,
                loaded: false,
                closed: false,
                generation: 0,
                current_page: 1,
                cumulative: false,
                unavailable: Vec::new(),
                ignored_clicks: HashMap::new(),
                stale_clicks: 0,
                close_on_click: None,
                interrupt_on_page: None,
                panic_on_page: None,
                clicks: HashMap::new(),
                toggle_clicks: 0,
                refreshes: 0,
                navigations: Vec::new(),
            }),
        }
    }

    /// Overrides the result count shown before the filter is applied
    pub fn with_unfiltered_total(self, total: u32) -> Self {
        self.lock().unfiltered_total = Some(total);
        self
    }

    /// Overrides the page count reported by the results container
    pub fn with_total_pages(self, pages: u32) -> Self {
        self.lock().total_pages = Some(pages);
        self
    }

    /// Applying the filter leaves the result count unchanged
    pub fn with_ineffective_filter(self) -> Self {
        self.lock().filter_effective = false;
        self
    }

    /// The filter group starts out expanded
    pub fn with_filter_expanded(self) -> Self {
        self.lock().filter_expanded = true;
        self
    }

    /// The control for `strategy` never appears
    pub fn without_strategy(self, strategy: PaginationStrategy) -> Self {
        self.lock().unavailable.push(strategy);
        self
    }

    /// The next `count` clicks on `strategy` do not change the page
    pub fn ignore_clicks(self, strategy: PaginationStrategy, count: u32) -> Self {
        *self.lock().ignored_clicks.entry(strategy).or_insert(0) += count;
        self
    }

    /// The next `count` pagination clicks hit a stale element
    pub fn with_stale_clicks(self, count: u32) -> Self {
        self.lock().stale_clicks = count;
        self
    }

    /// Fires `trigger` when listings are requested on `page`, and shows none there
    pub fn interrupt_on_page(self, page: u32, trigger: ShutdownTrigger) -> Self {
        self.lock().interrupt_on_page = Some((page, trigger));
        self
    }

    /// Moves the simulated browser to `page` without any clicks
    /// Ends the browser session when the control for `strategy` is clicked
    pub fn close_on_click(self, strategy: PaginationStrategy) -> Self {
        self.lock().close_on_click = Some(strategy);
        self
    }

    /// Panics while listing the results of `page`
    pub fn panic_on_page(self, page: u32) -> Self {
        self.lock().panic_on_page = Some(page);
        self
    }

    pub fn set_current_page(&self, page: u32) {
        self.lock().current_page = page;
    }

    pub fn current_page(&self) -> u32 {
        self.lock().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.lock().total_pages()
    }

    /// Successful page changes made through `strategy`
    pub fn clicks(&self, strategy: PaginationStrategy) -> u32 {
        self.lock().clicks.get(&strategy).copied().unwrap_or(0)
    }

    pub fn toggle_clicks(&self) -> u32 {
        self.lock().toggle_clicks
    }

    pub fn filter_applied(&self) -> bool {
        self.lock().filter_applied
    }

    pub fn refreshes(&self) -> u32 {
        self.lock().refreshes
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_state(&self) -> DriverResult<MutexGuard<'_, SiteState>> {
        let state = self.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        Ok(state)
    }

    fn live_state(&self, element: &MockElement) -> DriverResult<MutexGuard<'_, SiteState>> {
        let state = self.open_state()?;
        if element.generation != state.generation {
            return Err(DriverError::StaleElement(format!("{:?}", element.node)));
        }
        Ok(state)
    }

    fn handle(state: &SiteState, node: Node) -> MockElement {
        MockElement {
            node,
            generation: state.generation,
        }
    }

    fn click(state: &mut SiteState, node: Node) -> DriverResult<()> {
        match node {
            Node::Toggle => {
                state.toggle_clicks += 1;
                state.filter_expanded = true;
            }
            Node::FilterOption => {
                state.filter_applied = true;
            }
            Node::Control(strategy) => {
                if state.close_on_click == Some(strategy) {
                    state.closed = true;
                    return Err(DriverError::Closed);
                }

                if state.stale_clicks > 0 {
                    state.stale_clicks -= 1;
                    state.generation += 1;
                    return Err(DriverError::StaleElement(format!(
                        "{} control detached",
                        strategy
                    )));
                }

                if let Some(ignored) = state.ignored_clicks.get_mut(&strategy) {
                    if *ignored > 0 {
                        *ignored -= 1;
                        return Ok(());
                    }
                }

                if state.current_page < state.total_pages() {
                    state.current_page += 1;
                    state.cumulative = strategy == PaginationStrategy::ExpandInPlace;
                    *state.clicks.entry(strategy).or_insert(0) += 1;
                }
            }
            Node::Results | Node::Listing(_) | Node::Field(..) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for MockListingSite {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.open_state()?;
        state.loaded = true;
        state.generation += 1;
        state.current_page = 1;
        state.cumulative = false;
        state.filter_applied = false;
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let state = self.open_state()?;
        Ok(state
            .navigations
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn refresh(&self) -> DriverResult<()> {
        let mut state = self.open_state()?;
        state.generation += 1;
        state.refreshes += 1;
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> DriverResult<Option<MockElement>> {
        let state = self.open_state()?;
        if !state.loaded {
            return Ok(None);
        }

        let s = &self.selectors;
        let node = if selector == s.results {
            Some(Node::Results)
        } else if selector == s.toggle {
            Some(Node::Toggle)
        } else if selector == s.option {
            state.filter_expanded.then_some(Node::FilterOption)
        } else if selector == s.expand_in_place {
            state
                .control_present(PaginationStrategy::ExpandInPlace)
                .then_some(Node::Control(PaginationStrategy::ExpandInPlace))
        } else if selector == s.next_link {
            state
                .control_present(PaginationStrategy::NextLink)
                .then_some(Node::Control(PaginationStrategy::NextLink))
        } else if selector == s.item {
            let first = state.visible_listings().next();
            first.map(Node::Listing)
        } else {
            None
        };

        Ok(node.map(|node| Self::handle(&state, node)))
    }

    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<MockElement>> {
        if selector != self.selectors.item {
            return Ok(self.find_element(selector).await?.into_iter().collect());
        }

        let state = self.open_state()?;
        if !state.loaded {
            return Ok(Vec::new());
        }

        if let Some((page, trigger)) = &state.interrupt_on_page {
            if *page == state.current_page {
                trigger.trigger();
                return Ok(Vec::new());
            }
        }

        if state.panic_on_page == Some(state.current_page) {
            let page = state.current_page;
            drop(state);
            panic!("listing renderer crashed on page {}", page);
        }

        Ok(state
            .visible_listings()
            .map(|index| Self::handle(&state, Node::Listing(index)))
            .collect())
    }

    async fn find_child(
        &self,
        parent: &MockElement,
        selector: &str,
    ) -> DriverResult<Option<MockElement>> {
        let state = self.live_state(parent)?;
        let Node::Listing(index) = parent.node else {
            return Ok(None);
        };

        let s = &self.selectors;
        let field = if selector == s.title {
            state.jobs[index].title.as_ref().map(|_| Field::Title)
        } else if selector == s.department {
            Some(Field::Department)
        } else if selector == s.location {
            Some(Field::Location)
        } else {
            None
        };

        Ok(field.map(|field| Self::handle(&state, Node::Field(index, field))))
    }

    async fn attribute(&self, element: &MockElement, name: &str) -> DriverResult<Option<String>> {
        let state = self.live_state(element)?;
        let s = &self.selectors;

        let value = match element.node {
            Node::Results if name == s.total_results => Some(state.shown_total().to_string()),
            Node::Results if name == s.current_page => Some(state.current_page.to_string()),
            Node::Results if name == s.total_pages => Some(state.total_pages().to_string()),
            Node::Toggle if name == "class" => Some(if state.filter_expanded {
                format!("filter-toggle {}", s.expanded_class)
            } else {
                "filter-toggle".to_string()
            }),
            Node::Listing(index) if name == s.id_attribute => Some(state.jobs[index].id.clone()),
            Node::Listing(index) if name == s.url_attribute => Some(state.jobs[index].url.clone()),
            _ => None,
        };

        Ok(value)
    }

    async fn text(&self, element: &MockElement) -> DriverResult<String> {
        let state = self.live_state(element)?;

        let text = match element.node {
            Node::Field(index, Field::Title) => state.jobs[index].title.clone().unwrap_or_default(),
            Node::Field(index, Field::Department) => state.jobs[index].department.clone(),
            Node::Field(index, Field::Location) => state.jobs[index].location.clone(),
            _ => String::new(),
        };

        Ok(text)
    }

    async fn execute_script(&self, script: &str, element: &MockElement) -> DriverResult<()> {
        let mut state = self.live_state(element)?;

        if script == CLICK_SCRIPT {
            Self::click(&mut state, element.node)
        } else if script == SCROLL_INTO_VIEW_SCRIPT {
            Ok(())
        } else {
            Err(DriverError::Command(format!("unsupported script: {}", script)))
        }
    }

    async fn quit(&mut self) -> DriverResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::read_int_attribute;

    fn site(jobs: usize, page_size: usize) -> (Config, MockListingSite) {
        let config = Config::default();
        let site = MockListingSite::new(&config, numbered_jobs("job", jobs), page_size);
        (config, site)
    }

    #[tokio::test]
    async fn test_nothing_found_before_navigation() {
        let (config, site) = site(5, 2);
        let found = site.find_element(&config.site.results_selector).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_filter_reduces_total() {
        let (config, site) = site(10, 5);
        let site = site.with_unfiltered_total(50);
        site.navigate(&config.site.url).await.unwrap();

        let total = read_int_attribute(
            &site,
            &config.site.results_selector,
            &config.site.total_results_attribute,
        )
        .await
        .unwrap();
        assert_eq!(total, Some(50));

        let toggle = site
            .find_element(&config.filter.toggle_selector)
            .await
            .unwrap()
            .unwrap();
        site.execute_script(CLICK_SCRIPT, &toggle).await.unwrap();
        let option = site
            .find_element(&config.filter.option_selector)
            .await
            .unwrap()
            .unwrap();
        site.execute_script(CLICK_SCRIPT, &option).await.unwrap();

        let total = read_int_attribute(
            &site,
            &config.site.results_selector,
            &config.site.total_results_attribute,
        )
        .await
        .unwrap();
        assert_eq!(total, Some(10));
    }

    #[tokio::test]
    async fn test_refresh_makes_handles_stale() {
        let (config, site) = site(3, 3);
        site.navigate(&config.site.url).await.unwrap();

        let results = site
            .find_element(&config.site.results_selector)
            .await
            .unwrap()
            .unwrap();
        site.refresh().await.unwrap();

        let err = site.attribute(&results, "data-current-page").await.unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn test_next_link_replaces_listings() {
        let (config, site) = site(5, 2);
        site.navigate(&config.site.url).await.unwrap();

        let next = site
            .find_element(&config.pagination.next_link.selector)
            .await
            .unwrap()
            .unwrap();
        site.execute_script(CLICK_SCRIPT, &next).await.unwrap();

        let listings = site.find_elements(&config.listing.item_selector).await.unwrap();
        assert_eq!(site.current_page(), 2);
        assert_eq!(listings.len(), 2);
        let id = site.attribute(&listings[0], "data-job-id").await.unwrap();
        assert_eq!(id.as_deref(), Some("job-3"));
    }

    #[tokio::test]
    async fn test_expand_in_place_accumulates_listings() {
        let (config, site) = site(5, 2);
        site.navigate(&config.site.url).await.unwrap();

        let more = site
            .find_element(&config.pagination.expand_in_place.selector)
            .await
            .unwrap()
            .unwrap();
        site.execute_script(CLICK_SCRIPT, &more).await.unwrap();

        let listings = site.find_elements(&config.listing.item_selector).await.unwrap();
        assert_eq!(listings.len(), 4);
    }

    #[tokio::test]
    async fn test_controls_hidden_on_last_page() {
        let (config, site) = site(4, 2);
        site.navigate(&config.site.url).await.unwrap();
        site.set_current_page(2);

        let next = site
            .find_element(&config.pagination.next_link.selector)
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_closed_site_rejects_commands() {
        let (config, mut site) = site(1, 1);
        site.quit().await.unwrap();

        let err = site.navigate(&config.site.url).await.unwrap_err();
        assert!(matches!(err, DriverError::Closed));
        assert!(site.is_closed());
    }
}
