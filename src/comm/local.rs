//! In-process SPMD world: one OS thread per participant.
//!
//! Participants share nothing but channels and a barrier. Each message is
//! tagged with the collective it belongs to, so a participant that receives
//! a message from a different collective, or with a different element count,
//! fails with an error instead of silently mixing data.
//!
//! An endpoint holds senders to the other participants only. Once every
//! participant that could still write to an inbox has returned, a pending
//! receive fails with [`MatscaleError::PeerDisconnected`]. A participant
//! waiting in [`Communicator::barrier`] is not released this way.

use std::{
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, Barrier,
    },
    thread,
};

use tracing::{info_span, trace};

use super::{Communicator, ROOT};
use crate::error::{collective_mismatch, config_error, MatscaleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collective {
    Broadcast,
    Scatter,
    Gather,
}

impl Collective {
    fn name(self) -> &'static str {
        match self {
            Collective::Broadcast => "broadcast",
            Collective::Scatter => "scatter_rows",
            Collective::Gather => "gather_rows",
        }
    }
}

struct Message {
    from: usize,
    collective: Collective,
    data: Vec<f64>,
}

/// One participant's endpoint in a [`LocalWorld`].
///
/// The inbox is a `Receiver`, which makes this type `!Sync`: a reference to
/// it cannot be captured by a worker-pool closure, so only the participant's
/// own thread can ever issue collectives.
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    /// Sender to every other rank; `None` at this endpoint's own rank.
    peers: Vec<Option<Sender<Message>>>,
    inbox: Receiver<Message>,
    barrier: Arc<Barrier>,
}

impl LocalCommunicator {
    /// Wires up `size` fully connected endpoints, returned in rank order.
    fn world(size: usize) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();
        let barrier = Arc::new(Barrier::new(size));

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                rank,
                size,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(to, tx)| (to != rank).then(|| tx.clone()))
                    .collect(),
                inbox,
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    fn send(&self, to: usize, collective: Collective, data: Vec<f64>) -> Result<()> {
        trace!(from = self.rank, to, collective = collective.name(), len = data.len(), "send");
        let disconnected = || MatscaleError::PeerDisconnected {
            peer: to,
            collective: collective.name(),
        };
        self.peers[to]
            .as_ref()
            .ok_or_else(disconnected)?
            .send(Message {
                from: self.rank,
                collective,
                data,
            })
            .map_err(|_| disconnected())
    }

    /// Takes the next message, which must belong to `collective`.
    ///
    /// `waiting_on` names the peer reported if every sender is gone.
    fn receive(
        &self,
        collective: Collective,
        expected_len: usize,
        waiting_on: usize,
    ) -> Result<Message> {
        let message = self.inbox.recv().map_err(|_| MatscaleError::PeerDisconnected {
            peer: waiting_on,
            collective: collective.name(),
        })?;
        if message.collective != collective {
            return Err(MatscaleError::CollectiveOrderError {
                rank: self.rank,
                expected: collective.name(),
                actual: message.collective.name(),
                from: message.from,
            });
        }
        if message.data.len() != expected_len {
            return Err(collective_mismatch(
                collective.name(),
                expected_len,
                message.data.len(),
            ));
        }
        Ok(message)
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, buf: &mut [f64]) -> Result<()> {
        if self.is_root() {
            for peer in (0..self.size).filter(|&r| r != ROOT) {
                self.send(peer, Collective::Broadcast, buf.to_vec())?;
            }
        } else {
            let message = self.receive(Collective::Broadcast, buf.len(), ROOT)?;
            buf.copy_from_slice(&message.data);
        }
        Ok(())
    }

    fn scatter_rows(&self, send: Option<&[f64]>, recv: &mut [f64]) -> Result<()> {
        let piece = recv.len();
        if !self.is_root() {
            let message = self.receive(Collective::Scatter, piece, ROOT)?;
            recv.copy_from_slice(&message.data);
            return Ok(());
        }

        let expected = piece * self.size;
        let send = send.ok_or_else(|| collective_mismatch(Collective::Scatter.name(), expected, 0))?;
        if send.len() != expected {
            return Err(collective_mismatch(
                Collective::Scatter.name(),
                expected,
                send.len(),
            ));
        }
        for peer in (0..self.size).filter(|&r| r != ROOT) {
            self.send(
                peer,
                Collective::Scatter,
                send[peer * piece..(peer + 1) * piece].to_vec(),
            )?;
        }
        recv.copy_from_slice(&send[ROOT * piece..(ROOT + 1) * piece]);
        Ok(())
    }

    fn gather_rows(&self, send: &[f64], recv: Option<&mut [f64]>) -> Result<()> {
        let piece = send.len();
        if !self.is_root() {
            return self.send(ROOT, Collective::Gather, send.to_vec());
        }

        let expected = piece * self.size;
        let recv = recv.ok_or_else(|| collective_mismatch(Collective::Gather.name(), expected, 0))?;
        if recv.len() != expected {
            return Err(collective_mismatch(
                Collective::Gather.name(),
                expected,
                recv.len(),
            ));
        }
        recv[ROOT * piece..(ROOT + 1) * piece].copy_from_slice(send);
        let mut arrived = vec![false; self.size];
        arrived[ROOT] = true;
        for _ in 1..self.size {
            let missing = arrived.iter().position(|&done| !done).unwrap_or(ROOT);
            let message = self.receive(Collective::Gather, piece, missing)?;
            let from = message.from;
            arrived[from] = true;
            recv[from * piece..(from + 1) * piece].copy_from_slice(&message.data);
        }
        Ok(())
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Runs SPMD programs with every participant on its own scoped thread.
pub struct LocalWorld;

impl LocalWorld {
    /// Runs `program` once per participant and returns the results in rank order.
    ///
    /// If any participant fails, the error of the lowest failing rank is
    /// returned. A participant that fails while its peers are blocked on a
    /// collective leaves them blocked; callers must not rely on recovery.
    pub fn run<T, F>(size: usize, program: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&LocalCommunicator) -> Result<T> + Sync,
    {
        if size == 0 {
            return Err(config_error("a world needs at least one participant"));
        }

        let program = &program;
        let results: Vec<Result<T>> = thread::scope(|s| {
            let handles: Vec<_> = LocalCommunicator::world(size)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let _span = info_span!("rank", rank = comm.rank()).entered();
                        program(&comm)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_and_size() {
        let ranks = LocalWorld::run(4, |comm| Ok((comm.rank(), comm.size()))).unwrap();
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn test_zero_participants_rejected() {
        assert!(LocalWorld::run(0, |_| Ok(())).is_err());
    }

    #[test]
    fn test_broadcast_copies_root_buffer() {
        let bufs = LocalWorld::run(3, |comm| {
            let mut buf = if comm.is_root() {
                vec![1.0, 2.0, 3.0]
            } else {
                vec![0.0; 3]
            };
            comm.broadcast(&mut buf)?;
            Ok(buf)
        })
        .unwrap();
        assert!(bufs.iter().all(|b| b == &[1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_scatter_then_gather_restores_order() {
        let global: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let gathered = LocalWorld::run(4, |comm| {
            let mut local = vec![0.0; 3];
            let send = comm.is_root().then_some(global.as_slice());
            comm.scatter_rows(send, &mut local)?;
            assert_eq!(local[0], (comm.rank() * 3) as f64);

            for x in local.iter_mut() {
                *x *= 10.0;
            }
            comm.barrier();

            let mut out = comm.is_root().then(|| vec![0.0; 12]);
            comm.gather_rows(&local, out.as_deref_mut())?;
            Ok(out)
        })
        .unwrap();

        let expected: Vec<f64> = (0..12).map(|x| x as f64 * 10.0).collect();
        assert_eq!(gathered[0].as_deref(), Some(expected.as_slice()));
        assert!(gathered[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_root_scatter_size_mismatch() {
        let err = LocalWorld::run(1, |comm| {
            let mut local = vec![0.0; 4];
            comm.scatter_rows(Some(&[1.0, 2.0, 3.0]), &mut local)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            MatscaleError::CollectiveMismatchError {
                collective: "scatter_rows",
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_broadcast_length_mismatch_on_receiver() {
        let results = LocalWorld::run(2, |comm| {
            let mut buf = vec![0.0; if comm.is_root() { 4 } else { 2 }];
            Ok(comm.broadcast(&mut buf))
        })
        .unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(MatscaleError::CollectiveMismatchError {
                collective: "broadcast",
                expected: 2,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_receiver_sees_root_disconnect() {
        let results = LocalWorld::run(2, |comm| {
            if comm.is_root() {
                return Ok(Ok(()));
            }
            let mut buf = vec![0.0; 2];
            Ok(comm.broadcast(&mut buf))
        })
        .unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(MatscaleError::PeerDisconnected {
                peer: 0,
                collective: "broadcast"
            })
        ));
    }

    #[test]
    fn test_gather_names_first_missing_rank() {
        let results = LocalWorld::run(3, |comm| {
            if !comm.is_root() {
                return Ok(Ok(()));
            }
            let mut out = vec![0.0; 3];
            Ok(comm.gather_rows(&[1.0], Some(&mut out)))
        })
        .unwrap();
        assert!(matches!(
            results[0],
            Err(MatscaleError::PeerDisconnected {
                peer: 1,
                collective: "gather_rows"
            })
        ));
    }

    #[test]
    fn test_out_of_order_collective_detected() {
        let results = LocalWorld::run(2, |comm| {
            let mut buf = vec![0.0; 2];
            if comm.is_root() {
                Ok(comm.broadcast(&mut buf))
            } else {
                Ok(comm.scatter_rows(None, &mut buf))
            }
        })
        .unwrap();
        assert!(matches!(
            results[1],
            Err(MatscaleError::CollectiveOrderError {
                rank: 1,
                expected: "scatter_rows",
                actual: "broadcast",
                from: 0
            })
        ));
    }
}
