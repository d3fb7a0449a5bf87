use crate::dump::MemoryDump;
use crate::error::{LinkFailure, TransformError, TransformResult};
use crate::graph::FrameGraph;
use crate::path;
use crate::transform::{sanitize_rotation, RigidTransform, StampedTransform};
use cu29::clock::{CuDuration, CuTime};
use glam::{DMat4, DQuat, DVec3};
use std::fmt;
use std::io::{self, Write};
use std::sync::RwLock;

/// Largest scalar part a translation quaternion may carry and still count
/// as pure.
pub const PURE_TRANSLATION_TOLERANCE: f64 = 1e-6;

/// A non-fatal condition observed while accepting a write.
#[derive(Clone, Debug)]
pub enum TransformWarning {
    /// Rotation norm drifted outside the tolerated band; the value was
    /// normalized and accepted.
    NonNormalRotation { from: String, to: String, norm: f64 },
    /// Translation quaternion had a non-negligible scalar part; the vector
    /// part was accepted.
    NonPureTranslation {
        from: String,
        to: String,
        scalar: f64,
    },
    /// Sample stamp fell behind the storage horizon; the write was ignored.
    StaleSample {
        from: String,
        to: String,
        stamp: CuTime,
    },
}

impl fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformWarning::NonNormalRotation { from, to, norm } => write!(
                f,
                "rotation norm {norm} out of band on link '{from}' -> '{to}', renormalized"
            ),
            TransformWarning::NonPureTranslation { from, to, scalar } => write!(
                f,
                "translation quaternion on link '{from}' -> '{to}' has scalar part {scalar}"
            ),
            TransformWarning::StaleSample { from, to, stamp } => write!(
                f,
                "sample at {stamp} on link '{from}' -> '{to}' is behind the storage horizon, dropped"
            ),
        }
    }
}

/// Receives ingress diagnostics. Injected so embedders and tests decide
/// where warnings go; implementations must not call back into the memory.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, warning: &TransformWarning);
}

/// Default sink, forwarding to the `log` facade.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&self, warning: &TransformWarning) {
        log::warn!("{warning}");
    }
}

/// The transformation memory.
///
/// Writers call [`connect`](TransMem::connect) (or one of its ingress
/// variants) as transformations arrive; readers query with
/// [`transform_at`](TransMem::transform_at),
/// [`best_transform`](TransMem::best_transform) or
/// [`chained_transform`](TransMem::chained_transform). One `RwLock` guards
/// the whole graph, so writes serialize and every reader sees a consistent
/// snapshot for the duration of its call.
pub struct TransMem {
    inner: RwLock<FrameGraph>,
    diagnostics: Box<dyn DiagnosticsSink>,
}

impl TransMem {
    pub const DEFAULT_STORAGE_HORIZON: CuDuration = CuDuration(10_000_000_000);

    /// Creates a memory whose links keep samples at most `storage_horizon`
    /// behind their newest entry.
    pub fn new(storage_horizon: CuDuration) -> Self {
        Self::with_diagnostics(storage_horizon, Box::new(LogDiagnostics))
    }

    pub fn with_diagnostics(
        storage_horizon: CuDuration,
        diagnostics: Box<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            inner: RwLock::new(FrameGraph::new(storage_horizon)),
            diagnostics,
        }
    }

    /// Records the transformation from `src` to `dst` observed at `stamp`.
    ///
    /// Frames and the link are created on first use. A rotation whose norm
    /// drifted beyond ±0.5% is renormalized and reported; a stamp behind
    /// the link's storage horizon is dropped and reported. Both conditions
    /// leave the call successful; only a self-connection fails.
    pub fn connect(
        &self,
        src: &str,
        dst: &str,
        stamp: CuTime,
        rotation: DQuat,
        translation: DVec3,
    ) -> TransformResult<()> {
        // Reject before validating so a failed write leaves no trace on the
        // diagnostics sink.
        if src == dst {
            return Err(TransformError::SelfLoop(src.to_string()));
        }

        let (rotation, drift) = sanitize_rotation(rotation);
        if let Some(norm) = drift {
            self.diagnostics.report(&TransformWarning::NonNormalRotation {
                from: src.to_string(),
                to: dst.to_string(),
                norm,
            });
        }

        let sample = StampedTransform::new(stamp, RigidTransform::new(rotation, translation));
        let accepted = self.inner.write().unwrap().connect(src, dst, sample)?;
        if !accepted {
            self.diagnostics.report(&TransformWarning::StaleSample {
                from: src.to_string(),
                to: dst.to_string(),
                stamp,
            });
        }
        Ok(())
    }

    /// Ingress variant taking the translation as a pure quaternion
    /// (0, x, y, z). A non-negligible scalar part is reported and the
    /// vector part used regardless.
    pub fn connect_pure(
        &self,
        src: &str,
        dst: &str,
        stamp: CuTime,
        rotation: DQuat,
        translation: DQuat,
    ) -> TransformResult<()> {
        if translation.w.abs() > PURE_TRANSLATION_TOLERANCE {
            self.diagnostics
                .report(&TransformWarning::NonPureTranslation {
                    from: src.to_string(),
                    to: dst.to_string(),
                    scalar: translation.w,
                });
        }
        let vector = DVec3::new(translation.x, translation.y, translation.z);
        self.connect(src, dst, stamp, rotation, vector)
    }

    /// Ingress variant taking a homogeneous matrix. The rotation block is
    /// converted to a quaternion (norm validation applies as usual) and the
    /// last column becomes the translation.
    pub fn connect_matrix(
        &self,
        src: &str,
        dst: &str,
        stamp: CuTime,
        matrix: DMat4,
    ) -> TransformResult<()> {
        let rotation = DQuat::from_mat4(&matrix);
        let translation = matrix.w_axis.truncate();
        self.connect(src, dst, stamp, rotation, translation)
    }

    /// The transformation mapping coordinates in `src` to coordinates in
    /// `dst` at `time`.
    pub fn transform_at(
        &self,
        src: &str,
        dst: &str,
        time: CuTime,
    ) -> TransformResult<RigidTransform> {
        let inner = self.inner.read().unwrap();
        let resolved = path::shortest_path(&inner, src, dst)?;
        path::compose_along(&inner, &resolved, time)
    }

    /// Like [`transform_at`](TransMem::transform_at), but first replaces
    /// `time` with the instant at which all links on the path have the
    /// least-stale data, then composes there. The chosen instant is written
    /// back through `time`.
    pub fn best_transform(
        &self,
        src: &str,
        dst: &str,
        time: &mut CuTime,
    ) -> TransformResult<RigidTransform> {
        let inner = self.inner.read().unwrap();
        let resolved = path::shortest_path(&inner, src, dst)?;
        *time = path::best_common_time(&inner, &resolved)?;
        path::compose_along(&inner, &resolved, *time)
    }

    /// Two-leg query: the transformation from `src` at `t1` through `fix`
    /// to `dst` at `t2`, evaluated under a single consistent snapshot.
    pub fn chained_transform(
        &self,
        src: &str,
        fix: &str,
        dst: &str,
        t1: CuTime,
        t2: CuTime,
    ) -> TransformResult<RigidTransform> {
        let inner = self.inner.read().unwrap();

        let first_leg = path::shortest_path(&inner, src, fix)?;
        let first = path::compose_along(&inner, &first_leg, t1)?;

        let second_leg = path::shortest_path(&inner, fix, dst)?;
        let second = path::compose_along(&inner, &second_leg, t2)?;

        Ok(second.compose(&first))
    }

    /// Overrides the shortest-path weight of the link between `a` and `b`.
    pub fn set_link_weight(&self, a: &str, b: &str, weight: f64) -> TransformResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(TransformError::InvalidWeight(weight));
        }

        let mut inner = self.inner.write().unwrap();
        let reason = if inner.frame(a).is_none() || inner.frame(b).is_none() {
            LinkFailure::UnknownFrame
        } else {
            LinkFailure::Disconnected
        };
        match inner.link_between_mut(a, b) {
            Some(link) => {
                link.set_weight(weight);
                Ok(())
            }
            None => Err(TransformError::NoSuchLink {
                from: a.to_string(),
                to: b.to_string(),
                reason,
            }),
        }
    }

    /// A point-in-time copy of the whole memory for debugging sinks.
    pub fn snapshot(&self) -> MemoryDump {
        MemoryDump::capture(&self.inner.read().unwrap())
    }

    /// Dumps the whole memory as JSON. Fire-and-forget: failures never
    /// affect the memory itself.
    pub fn dump_json(&self, writer: impl Write) -> io::Result<()> {
        self.snapshot().write_json(writer)
    }

    /// Dumps the graph topology as GraphML.
    pub fn dump_graphml(&self, writer: impl Write) -> io::Result<()> {
        self.snapshot().write_graphml(writer)
    }
}

impl Default for TransMem {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STORAGE_HORIZON)
    }
}
