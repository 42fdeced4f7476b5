// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Deletion racing against the target's own cancellation point bookkeeping. Runs under loom with
//! `RUSTFLAGS="--cfg loom"`, and as a plain threaded test otherwise.

#![cfg(feature = "cancellation-points")]

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cancel::{CancelType, Cancelability};
use crate::cancel_point::CancellationPoint;
use crate::loom;
use crate::task::TaskKind;
use crate::test_util::MockKernel;

const SELF_ID: u32 = 1;
const TARGET_ID: u32 = 2;

#[test]
fn delete_races_leaving_cancellation_point() {
    let _trace = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_names(true)
        .set_default();

    loom::model(|| {
        let kernel = Arc::new(MockKernel::new());
        kernel.spawn_running(SELF_ID, Cancelability::Enabled, CancelType::Asynchronous);
        let target = kernel.spawn(
            TARGET_ID,
            TaskKind::Task,
            Cancelability::Enabled,
            CancelType::Deferred,
        );

        let t = {
            let kernel = kernel.clone();
            let target = target.clone();
            loom::thread::spawn(move || {
                // the target blocks in a cancellation point and then wakes up again, either
                // because of the notification or on its own
                match CancellationPoint::enter(&*kernel.sched, &target) {
                    Ok(cp) => cp.check().is_err(),
                    Err(_) => true,
                }
            })
        };

        kernel.deleter().delete(target.id()).unwrap();
        let target_saw_cancel = t.join().unwrap();

        let state = kernel.state_of(&target);
        assert_eq!(state.cp_depth, 0);
        assert!(kernel.notifications() <= 1);
        // the request is either still pending or was consumed by the target, never lost
        assert!(state.pending != target_saw_cancel);
        assert!(!kernel.sched.is_locked());
    });
}
