//! Native request loop speaking the ring protocol from the worker side.

use mailbox::layout::{RESP_STATUS_ERROR, RESP_STATUS_OK};
use mailbox::{GuestMemory, RequestDescriptor, ResponseDescriptor, RingConsumer};
use tracing::trace;

use crate::WorkerCore;

/// Most requests retired by a single [`ServiceLoop::step`].
const MAX_BATCH: usize = 4;

/// Outcome a handler reports for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceReply {
    pub ok: bool,
    pub result_code: u32,
    pub resp_len: u32,
}

impl ServiceReply {
    pub fn ok(resp_len: u32) -> Self {
        Self {
            ok: true,
            result_code: 0,
            resp_len,
        }
    }

    pub fn error(result_code: u32) -> Self {
        Self {
            ok: false,
            result_code,
            resp_len: 0,
        }
    }
}

/// Handles requests popped off a ring.
pub trait ServiceHandler: Send {
    /// Serves `request`, reading and writing payloads through `memory`.
    fn handle(&mut self, request: &RequestDescriptor, memory: &GuestMemory) -> ServiceReply;
}

impl<F> ServiceHandler for F
where
    F: FnMut(&RequestDescriptor, &GuestMemory) -> ServiceReply + Send,
{
    fn handle(&mut self, request: &RequestDescriptor, memory: &GuestMemory) -> ServiceReply {
        self(request, memory)
    }
}

/// Worker core that peeks requests, hands them to a [`ServiceHandler`], and
/// publishes the response in the request's slot.
pub struct ServiceLoop<H> {
    name: &'static str,
    consumer: RingConsumer,
    handler: H,
    served: u64,
}

impl<H: ServiceHandler> ServiceLoop<H> {
    pub fn new(name: &'static str, consumer: RingConsumer, handler: H) -> Self {
        Self {
            name,
            consumer,
            handler,
            served: 0,
        }
    }

    /// Requests completed so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    fn serve_one(&mut self) -> bool {
        let Some((slot, request)) = self.consumer.peek() else {
            return false;
        };
        let reply = self
            .handler
            .handle(&request, self.consumer.memory().as_ref());
        let response = ResponseDescriptor {
            ticket: request.ticket,
            status: if reply.ok {
                RESP_STATUS_OK
            } else {
                RESP_STATUS_ERROR
            },
            result_code: reply.result_code,
            resp_len: reply.resp_len,
        };
        self.consumer.complete(&response);
        self.served += 1;
        trace!(
            worker = self.name,
            slot,
            ticket = request.ticket,
            op = request.op,
            ok = reply.ok,
            "request served"
        );
        true
    }
}

impl<H: ServiceHandler> WorkerCore for ServiceLoop<H> {
    fn step(&mut self) -> usize {
        let mut done = 0;
        while done < MAX_BATCH && self.serve_one() {
            done += 1;
        }
        done
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
