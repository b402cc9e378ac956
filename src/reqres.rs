//! `ReqRes`: a one-shot latch pairing a request with its eventual response.
//!
//! Mirrors the upstream `RequestRecord`/`ReqRes`: a caller gets one back from
//! every enqueue, can `wait()` on it asynchronously, and can register a
//! per-request callback that fires immediately if the record is already
//! done by the time it's attached.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{Request, Response};

type Callback = Box<dyn FnOnce(&Request, &Response) + Send + 'static>;

struct Inner {
    response: Option<Response>,
    done: bool,
    callback: Option<Callback>,
}

/// A handle to an in-flight (or already-completed) request.
pub struct ReqRes {
    request: Request,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl ReqRes {
    pub fn new(request: Request) -> Arc<Self> {
        Arc::new(ReqRes {
            request,
            inner: Mutex::new(Inner {
                response: None,
                done: false,
                callback: None,
            }),
            notify: Notify::new(),
        })
    }

    /// Build an already-completed record, as the local (in-process) client
    /// does: there is no wire round trip to wait for.
    pub fn completed(request: Request, response: Response) -> Arc<Self> {
        let reqres = ReqRes::new(request);
        reqres.set_response(response);
        reqres
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    /// Store the response and release the latch. At most once; a second
    /// call is a no-op (mirrors the upstream's set-once discipline).
    pub fn set_response(self: &Arc<Self>, response: Response) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.done {
                return;
            }
            inner.response = Some(response);
            inner.done = true;
            inner.callback.take()
        };
        if let Some(cb) = callback {
            let response = self.inner.lock().response.clone().expect("just set");
            cb(&self.request, &response);
        }
        self.notify.notify_waiters();
    }

    /// Release the latch with no response, as happens when a connection is
    /// reset out from under an in-flight request.
    pub fn fail(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.done {
            return;
        }
        inner.done = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Register a callback to run once the response is available. If the
    /// record is already done, the callback runs immediately (inline, on
    /// the calling task) with the stored response, if any.
    pub fn set_callback<F>(self: &Arc<Self>, cb: F)
    where
        F: FnOnce(&Request, &Response) + Send + 'static,
    {
        let existing_response = {
            let mut inner = self.inner.lock();
            if inner.done {
                inner.response.clone()
            } else {
                inner.callback = Some(Box::new(cb));
                return;
            }
        };
        if let Some(response) = existing_response {
            cb(&self.request, &response);
        }
    }

    /// Wait for the latch to release, returning the response if one was set
    /// (`None` means the connection was reset before a response arrived).
    pub async fn wait(self: &Arc<Self>) -> Option<Response> {
        loop {
            // Register for notification before checking `done`: `notify_waiters`
            // wakes only futures that already exist, so checking first and
            // creating the `Notified` after would risk missing a wakeup that
            // lands in between.
            let notified = self.notify.notified();
            {
                let inner = self.inner.lock();
                if inner.done {
                    return inner.response.clone();
                }
            }
            notified.await;
        }
    }
}
