//! Tests for the superstep primitives of the in-process BSP machine

use std::sync::Arc;

use bspcg::bsp::{self, Bsp, Buffer};
use bspcg::Error;

#[test]
fn test_put_to_every_processor() {
    let results = bsp::run(4, |ctx| {
        let board = Buffer::filled("board", ctx.nprocs(), usize::MAX)?;
        let reg = ctx.push_reg(&board);
        ctx.sync()?;

        let pid = ctx.pid();
        for t in 0..ctx.nprocs() {
            ctx.put(t, &[pid * 10], reg, pid)?;
        }
        // Nothing is visible before the barrier
        let before = board.to_vec();
        ctx.sync()?;
        Ok((before, board.to_vec()))
    })
    .unwrap();

    for (before, after) in results {
        assert_eq!(before, vec![usize::MAX; 4]);
        assert_eq!(after, vec![0, 10, 20, 30]);
    }
}

#[test]
fn test_get_sees_values_of_previous_superstep() {
    let results = bsp::run(3, |ctx| {
        let value = Buffer::from_vec(vec![ctx.pid() as f64]);
        let reg = ctx.push_reg(&value);
        ctx.sync()?;

        let right = (ctx.pid() + 1) % ctx.nprocs();
        let fetched = Buffer::filled("fetched", 1, -1.0)?;
        ctx.get(right, reg, 0, 1, &fetched, 0)?;
        // Overwrite our own value in the same superstep: the reader on the
        // left still sees the old one.
        ctx.put(ctx.pid(), &[100.0], reg, 0)?;
        ctx.sync()?;
        Ok((fetched.to_vec()[0], value.to_vec()[0]))
    })
    .unwrap();

    assert_eq!(results, vec![(1.0, 100.0), (2.0, 100.0), (0.0, 100.0)]);
}

#[test]
fn test_indexed_get_across_processors() {
    let results = bsp::run(3, |ctx| {
        let mine: Vec<i64> = (0..4).map(|i| (ctx.pid() * 100 + i) as i64).collect();
        let source = Buffer::from_vec(mine);
        let reg = ctx.push_reg(&source);
        ctx.sync()?;

        let owners: Arc<[usize]> = vec![2, 0, 1, 2].into();
        let offsets: Arc<[usize]> = vec![3, 0, 2, 1].into();
        let dst = Buffer::filled("dst", 4, 0i64)?;
        ctx.get_indexed(reg, owners, offsets, &dst)?;
        ctx.sync()?;
        Ok(dst.to_vec())
    })
    .unwrap();

    for dst in results {
        assert_eq!(dst, vec![203, 0, 102, 201]);
    }
}

#[test]
fn test_messages_ordered_by_sender_then_send_order() {
    let inboxes = bsp::run(4, |ctx| {
        for k in 0..3 {
            ctx.send(0, (ctx.pid(), k))?;
        }
        ctx.sync()?;
        let received = ctx.move_messages::<(usize, usize)>()?;
        // Undrained messages do not survive the next superstep
        ctx.send(ctx.pid(), 7u8)?;
        ctx.sync()?;
        ctx.sync()?;
        Ok((received, ctx.queue_len()))
    })
    .unwrap();

    let expected: Vec<(usize, usize)> = (0..4).flat_map(|s| (0..3).map(move |k| (s, k))).collect();
    assert_eq!(inboxes[0].0, expected);
    assert!(inboxes[1].0.is_empty());
    assert!(inboxes.iter().all(|(_, left)| *left == 0));
}

#[test]
fn test_out_of_bounds_put_aborts_everyone() {
    let result = bsp::run(3, |ctx| {
        let buf = Buffer::filled("small", 2, 0u32)?;
        let reg = ctx.push_reg(&buf);
        ctx.sync()?;
        if ctx.pid() == 1 {
            ctx.put(0, &[1, 2, 3], reg, 0)?;
        }
        ctx.sync()?;
        Ok(())
    });
    assert!(matches!(
        result,
        Err(Error::OutOfBounds {
            pid: 0,
            offset: 0,
            len: 3,
            capacity: 2
        })
    ));
}

#[test]
fn test_registration_mismatch_is_detected() {
    let result = bsp::run(2, |ctx| {
        if ctx.pid() == 0 {
            let extra = Buffer::filled("extra", 1, 0u8)?;
            ctx.push_reg(&extra);
        }
        ctx.sync()
    });
    assert!(matches!(result, Err(Error::RegistrationMismatch { .. })));
}

#[test]
fn test_local_error_aborts_blocked_peers() {
    let result = bsp::run(4, |ctx| {
        if ctx.pid() == 2 {
            return Err(Error::Config("bad input on processor 2".into()));
        }
        // The others would wait here forever without the collective abort
        ctx.sync()?;
        ctx.sync()
    });
    match result {
        Err(Error::Config(message)) => assert!(message.contains("processor 2")),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_explicit_abort() {
    let result = bsp::run(2, |ctx| {
        if ctx.pid() == 0 {
            return Err(ctx.abort("giving up"));
        }
        ctx.sync()
    });
    match result {
        Err(Error::Aborted { pid, reason }) => {
            assert_eq!(pid, 0);
            assert_eq!(reason, "giving up");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_superstep_counter() {
    let counts = bsp::run(2, |ctx| {
        for _ in 0..5 {
            ctx.sync()?;
        }
        Ok(ctx.superstep())
    })
    .unwrap();
    assert_eq!(counts, vec![5, 5]);
}
