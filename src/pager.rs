use std::mem;

use tracing::{debug, info, warn};

use crate::domain::RUVError;
use crate::record::Record;
use crate::view::SortConfig;

/// One fetched batch of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub records: Vec<Record>,
    pub sorted_by: SortConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Current,
    Next,
}

/// Ask the data source for the batch that becomes page `page_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: u64,
    pub slot: Slot,
    pub page_index: usize,
}

#[derive(Debug)]
pub enum PageState {
    Idle,
    FetchingCurrent {
        ticket: u64,
    },
    Ready {
        current: Page,
    },
    PrefetchPending {
        current: Page,
        ticket: u64,
    },
    PrefetchReady {
        current: Page,
        prefetched: Page,
    },
    Failed {
        current: Option<Page>,
        slot: Slot,
        error: RUVError,
    },
}

#[derive(Debug, PartialEq)]
pub enum Advance {
    Committed { prefetch: Option<FetchRequest> },
    Pending,
    AtEnd,
}

/// Double buffered page store. The displayed page can only advance to a page that was
/// already prefetched, and at most one fetch per slot is ever outstanding.
#[derive(Debug)]
pub struct PageCache {
    state: PageState,
    page_index: usize,
    max_page_index: usize,
    next_ticket: u64,
}

impl PageCache {
    pub fn new(total_records: usize, batch_size: usize) -> Self {
        let pages = total_records.div_ceil(batch_size.max(1)).max(1);
        PageCache {
            state: PageState::Idle,
            page_index: 0,
            max_page_index: pages - 1,
            next_ticket: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn max_page_index(&self) -> usize {
        self.max_page_index
    }

    pub fn current(&self) -> Option<&Page> {
        match &self.state {
            PageState::Ready { current }
            | PageState::PrefetchPending { current, .. }
            | PageState::PrefetchReady { current, .. } => Some(current),
            PageState::Failed { current, .. } => current.as_ref(),
            PageState::Idle | PageState::FetchingCurrent { .. } => None,
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut Page> {
        match &mut self.state {
            PageState::Ready { current }
            | PageState::PrefetchPending { current, .. }
            | PageState::PrefetchReady { current, .. } => Some(current),
            PageState::Failed { current, .. } => current.as_mut(),
            PageState::Idle | PageState::FetchingCurrent { .. } => None,
        }
    }

    pub fn prefetched(&self) -> Option<&Page> {
        match &self.state {
            PageState::PrefetchReady { prefetched, .. } => Some(prefetched),
            _ => None,
        }
    }

    /// True while the displayed page has not arrived yet.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, PageState::Idle | PageState::FetchingCurrent { .. })
    }

    pub fn is_prefetching(&self) -> bool {
        matches!(self.state, PageState::PrefetchPending { .. })
    }

    pub fn error(&self) -> Option<&RUVError> {
        match &self.state {
            PageState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Option<FetchRequest> {
        match self.state {
            PageState::Idle => {
                let request = self.request(Slot::Current, self.page_index);
                self.state = PageState::FetchingCurrent {
                    ticket: request.ticket,
                };
                info!("Fetching page {}", self.page_index);
                Some(request)
            }
            _ => None,
        }
    }

    /// Apply the result of a fetch. Returns the follow up request, if any.
    pub fn complete(
        &mut self,
        ticket: u64,
        result: Result<Page, RUVError>,
    ) -> Option<FetchRequest> {
        let state = mem::replace(&mut self.state, PageState::Idle);
        let (next, follow_up) = match (state, result) {
            (PageState::FetchingCurrent { ticket: t }, Ok(page)) if t == ticket => {
                debug!("Page {} arrived with {} records", page.index, page.records.len());
                self.prefetch(page)
            }
            (PageState::FetchingCurrent { ticket: t }, Err(error)) if t == ticket => {
                warn!("Fetching page {} failed: {error}", self.page_index);
                let next = PageState::Failed {
                    current: None,
                    slot: Slot::Current,
                    error,
                };
                (next, None)
            }
            (PageState::PrefetchPending { current, ticket: t }, Ok(prefetched)) if t == ticket => {
                debug!(
                    "Prefetched page {} with {} records",
                    prefetched.index,
                    prefetched.records.len()
                );
                (PageState::PrefetchReady { current, prefetched }, None)
            }
            (PageState::PrefetchPending { current, ticket: t }, Err(error)) if t == ticket => {
                warn!("Prefetching page {} failed: {error}", self.page_index + 1);
                let next = PageState::Failed {
                    current: Some(current),
                    slot: Slot::Next,
                    error,
                };
                (next, None)
            }
            (state, _) => {
                warn!("Dropping fetch result for stale ticket {ticket}");
                (state, None)
            }
        };
        self.state = next;
        follow_up
    }

    pub fn advance(&mut self) -> Advance {
        if self.page_index >= self.max_page_index {
            return Advance::AtEnd;
        }
        let state = mem::replace(&mut self.state, PageState::Idle);
        match state {
            PageState::PrefetchReady { prefetched, .. } => {
                self.page_index += 1;
                info!("Advanced to page {}", self.page_index);
                let (next, prefetch) = self.prefetch(prefetched);
                self.state = next;
                Advance::Committed { prefetch }
            }
            state => {
                debug!("Next page is not ready yet");
                self.state = state;
                Advance::Pending
            }
        }
    }

    /// Re-issue the fetch that failed. Only ever triggered by the user.
    pub fn retry(&mut self) -> Option<FetchRequest> {
        let state = mem::replace(&mut self.state, PageState::Idle);
        match state {
            PageState::Failed {
                current: None,
                slot: Slot::Current,
                ..
            } => {
                let request = self.request(Slot::Current, self.page_index);
                self.state = PageState::FetchingCurrent {
                    ticket: request.ticket,
                };
                info!("Retrying page {}", self.page_index);
                Some(request)
            }
            PageState::Failed {
                current: Some(current),
                ..
            } => {
                info!("Retrying prefetch of page {}", self.page_index + 1);
                let (next, request) = self.prefetch(current);
                self.state = next;
                request
            }
            state => {
                self.state = state;
                None
            }
        }
    }

    // Enter `Ready` with `current` and start the prefetch unless this is the last page.
    fn prefetch(&mut self, current: Page) -> (PageState, Option<FetchRequest>) {
        if self.page_index < self.max_page_index {
            let request = self.request(Slot::Next, self.page_index + 1);
            debug!("Prefetching page {}", request.page_index);
            let state = PageState::PrefetchPending {
                current,
                ticket: request.ticket,
            };
            (state, Some(request))
        } else {
            debug!("Last page reached, nothing to prefetch");
            (PageState::Ready { current }, None)
        }
    }

    fn request(&mut self, slot: Slot, page_index: usize) -> FetchRequest {
        self.next_ticket += 1;
        FetchRequest {
            ticket: self.next_ticket,
            slot,
            page_index,
        }
    }
}
