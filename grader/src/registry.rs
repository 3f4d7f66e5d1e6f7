use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

use quizmd::record::QuizRecord;

use crate::binding::Bindings;
use crate::checker::{EquivalenceResult, check_submission};
use crate::engine::{AlgebraEngine, ExpressionEngine};
use crate::error::{InstantiateError, RegistryError};
use crate::generator::generate;
use crate::render::render_display;
use crate::render::render_expression;

pub type InstanceId = u64;

/// One presented quiz: a record plus the bindings drawn for it and the
/// texts rendered from them. Immutable after construction apart from the
/// two submission counters.
#[derive(Debug)]
pub struct QuizInstance {
    pub record: Arc<QuizRecord>,
    pub bindings: Bindings,
    pub question: String,
    pub hint: Option<String>,
    pub explanation: Option<String>,
    /// The answer template rendered to a raw expression (or literal text).
    pub canonical_answer: String,
    /// Next submission token; each check call claims one.
    submissions: AtomicU64,
    /// Highest token whose verdict has been surfaced.
    reported: AtomicU64,
}

impl QuizInstance {
    fn instantiate(
        record: Arc<QuizRecord>,
        engine: &dyn ExpressionEngine,
        rng: &mut impl Rng,
    ) -> Result<QuizInstance, InstantiateError> {
        let bindings = generate(&record.variables, engine, rng)?;

        let question = render_display(&record.question, &bindings)?;
        let hint = record
            .hint
            .as_ref()
            .map(|t| render_display(t, &bindings))
            .transpose()?;
        let explanation = record
            .explanation
            .as_ref()
            .map(|t| render_display(t, &bindings))
            .transpose()?;
        let canonical_answer = render_expression(&record.answer.template, &bindings)?;

        Ok(QuizInstance {
            record,
            bindings,
            question,
            hint,
            explanation,
            canonical_answer,
            submissions: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        })
    }

    /// Total check calls made against this instance so far.
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Acquire)
    }

    fn next_token(&self) -> u64 {
        self.submissions.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Surface a verdict only if no later submission has been reported.
    /// Late verdicts for earlier submissions are dropped, not errors.
    fn publish(&self, token: u64, result: EquivalenceResult) -> Option<EquivalenceResult> {
        let mut seen = self.reported.load(Ordering::Acquire);
        loop {
            if token <= seen {
                return None;
            }
            match self.reported.compare_exchange(
                seen,
                token,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(result),
                Err(current) => seen = current,
            }
        }
    }
}

/// Live quiz instances, keyed by id. Lookups are read-mostly; inserts take
/// the write lock briefly. Instances themselves are immutable, so checks
/// run concurrently without holding any lock.
pub struct InstanceRegistry {
    instances: RwLock<HashMap<InstanceId, Arc<QuizInstance>>>,
    next_id: AtomicU64,
    engine: Box<dyn ExpressionEngine + Send + Sync>,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        InstanceRegistry::new(Box::new(AlgebraEngine))
    }
}

impl InstanceRegistry {
    pub fn new(engine: Box<dyn ExpressionEngine + Send + Sync>) -> Self {
        InstanceRegistry {
            instances: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            engine,
        }
    }

    /// Generate bindings for a record, render it, and register the result.
    pub fn instantiate(
        &self,
        record: Arc<QuizRecord>,
        rng: &mut impl Rng,
    ) -> Result<(InstanceId, Arc<QuizInstance>), InstantiateError> {
        let instance = Arc::new(QuizInstance::instantiate(record, self.engine.as_ref(), rng)?);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.instances
            .write()
            .expect("instance registry lock poisoned")
            .insert(id, Arc::clone(&instance));
        Ok((id, instance))
    }

    /// `instantiate` with a self-contained seeded generator.
    pub fn instantiate_seeded(
        &self,
        record: Arc<QuizRecord>,
        seed: u64,
    ) -> Result<(InstanceId, Arc<QuizInstance>), InstantiateError> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.instantiate(record, &mut rng)
    }

    pub fn get(&self, id: InstanceId) -> Result<Arc<QuizInstance>, RegistryError> {
        self.instances
            .read()
            .expect("instance registry lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownInstance(id))
    }

    /// Drop an instance. Checks already in flight keep their Arc and
    /// complete normally.
    pub fn remove(&self, id: InstanceId) -> Result<Arc<QuizInstance>, RegistryError> {
        self.instances
            .write()
            .expect("instance registry lock poisoned")
            .remove(&id)
            .ok_or(RegistryError::UnknownInstance(id))
    }

    /// Judge a submission against an instance. Returns `Ok(None)` when a
    /// later submission was already reported while this one was being
    /// judged (the verdict is superseded and must not be shown).
    pub fn check(
        &self,
        id: InstanceId,
        submission: &str,
    ) -> Result<Option<EquivalenceResult>, RegistryError> {
        self.check_with_rng(id, submission, &mut rand::rng())
    }

    /// `check` with caller-supplied randomness for the probing fallback.
    pub fn check_with_rng(
        &self,
        id: InstanceId,
        submission: &str,
        rng: &mut impl Rng,
    ) -> Result<Option<EquivalenceResult>, RegistryError> {
        let instance = self.get(id)?;
        let token = instance.next_token();

        let result = check_submission(
            &instance.canonical_answer,
            submission,
            instance.record.answer.mode,
            &instance.record.variables,
            self.engine.as_ref(),
            rng,
        );

        Ok(instance.publish(token, result))
    }
}
