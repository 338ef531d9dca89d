// src/toolkit/app_tasks.rs
//! The application thread's work source: proxy tasks first, then whatever
//! work the embedder plugged in.

use crate::pump::WorkSource;
use crate::threading::TaskQueue;
use crate::webview::proxy::ProxyContext;
use crate::webview::AppTask;
use log::*;
use std::rc::Rc;
use std::time::Instant;

pub(crate) struct AppTaskRunner {
    queue: TaskQueue<AppTask>,
    ctx: Rc<ProxyContext>,
    app_work: Option<Box<dyn WorkSource>>,
}

impl AppTaskRunner {
    pub(crate) fn new(queue: TaskQueue<AppTask>, ctx: Rc<ProxyContext>, app_work: Option<Box<dyn WorkSource>>) -> Self {
        Self { queue, ctx, app_work }
    }
}

impl WorkSource for AppTaskRunner {
    /// One task per call, so the pump can yield between tasks.
    fn do_work(&mut self) -> bool {
        let ran_task = match self.queue.try_next() {
            Some(task) => {
                trace!("AppTaskRunner: Running {:?}", task);
                self.ctx.run_task(task);
                true
            }
            None => false,
        };
        let more_app_work = self.app_work.as_mut().is_some_and(|work| work.do_work());
        ran_task || more_app_work
    }

    fn do_delayed_work(&mut self, next_delayed_work_time: &mut Option<Instant>) -> bool {
        match self.app_work.as_mut() {
            Some(work) => work.do_delayed_work(next_delayed_work_time),
            None => {
                *next_delayed_work_time = None;
                false
            }
        }
    }

    fn do_idle_work(&mut self) -> bool {
        self.app_work.as_mut().is_some_and(|work| work.do_idle_work())
    }
}
