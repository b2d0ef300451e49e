//! C4: FIFO request bus (spec.md §4.4).

use std::collections::VecDeque;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Refused,
    Expired,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: u64,
    pub from_speaker: u64,
    pub to_speaker: u64,
    pub action: String,
    pub payload: Option<Value>,
    pub status: RequestStatus,
    pub created_at: u64,
    pub expires_at: Option<u64>,
    pub response_data: Option<Value>,
}

#[derive(Default)]
pub struct RequestBus {
    /// Insertion order is the single source of global ordering; `pending`
    /// holds ids in arrival order so `get_pending_for` can filter without
    /// re-sorting (spec.md §4.4 "Ordering").
    requests: Vec<Request>,
    pending_order: VecDeque<u64>,
    next_id: u64,
}

impl RequestBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_request(
        &mut self,
        from: u64,
        to: u64,
        action: &str,
        payload: Option<Value>,
        created_at: u64,
        expires_at: Option<u64>,
    ) -> Request {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request {
            id,
            from_speaker: from,
            to_speaker: to,
            action: action.to_string(),
            payload,
            status: RequestStatus::Pending,
            created_at,
            expires_at,
            response_data: None,
        };
        self.requests.push(request.clone());
        self.pending_order.push_back(id);
        request
    }

    fn index_of(&self, id: u64) -> Option<usize> {
        self.requests.iter().position(|r| r.id == id)
    }

    /// Fails if `responder != request.to_speaker` or the request is not
    /// pending. Each request resolves exactly once.
    pub fn respond(
        &mut self,
        request_id: u64,
        responder_id: u64,
        accept: bool,
        data: Option<Value>,
    ) -> Option<Request> {
        let idx = self.index_of(request_id)?;
        if self.requests[idx].to_speaker != responder_id {
            return None;
        }
        if self.requests[idx].status != RequestStatus::Pending {
            return None;
        }
        self.requests[idx].status = if accept {
            RequestStatus::Accepted
        } else {
            RequestStatus::Refused
        };
        self.requests[idx].response_data = data;
        self.pending_order.retain(|&id| id != request_id);
        Some(self.requests[idx].clone())
    }

    /// Oldest pending request addressed to `speaker_id` is first (FIFO
    /// per-target; spec.md §4.4).
    pub fn get_pending_for(&self, speaker_id: u64) -> Vec<Request> {
        self.pending_order
            .iter()
            .filter_map(|id| self.requests.iter().find(|r| r.id == *id))
            .filter(|r| r.to_speaker == speaker_id)
            .cloned()
            .collect()
    }

    /// Called by the embedding application at coarse intervals, never from
    /// inside an evaluation (spec.md §5 "Cancellation and timeouts").
    pub fn check_timeouts(&mut self, now: u64) -> Vec<Request> {
        let mut expired = Vec::new();
        for req in self.requests.iter_mut() {
            if req.status == RequestStatus::Pending {
                if let Some(expires_at) = req.expires_at {
                    if now > expires_at {
                        req.status = RequestStatus::Expired;
                        expired.push(req.clone());
                    }
                }
            }
        }
        for req in &expired {
            self.pending_order.retain(|&id| id != req.id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_requires_matching_target() {
        let mut bus = RequestBus::new();
        let r = bus.create_request(0, 1, "action", None, 0, None);
        assert!(bus.respond(r.id, 0, true, None).is_none());
        assert!(bus.respond(r.id, 1, true, None).is_some());
    }

    #[test]
    fn respond_is_terminal() {
        let mut bus = RequestBus::new();
        let r = bus.create_request(0, 1, "action", None, 0, None);
        bus.respond(r.id, 1, false, None).unwrap();
        assert!(bus.respond(r.id, 1, true, None).is_none());
    }

    #[test]
    fn fifo_per_target() {
        let mut bus = RequestBus::new();
        let r1 = bus.create_request(0, 2, "a", None, 0, None);
        let r2 = bus.create_request(1, 2, "b", None, 0, None);
        let pending = bus.get_pending_for(2);
        assert_eq!(pending[0].id, r1.id);
        assert_eq!(pending[1].id, r2.id);
    }

    #[test]
    fn timeouts_mark_expired() {
        let mut bus = RequestBus::new();
        let r = bus.create_request(0, 1, "a", None, 0, Some(5));
        let expired = bus.check_timeouts(10);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, RequestStatus::Expired);
    }
}
