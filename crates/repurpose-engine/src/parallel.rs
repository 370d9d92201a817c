// Archivo: parallel.rs
// Propósito: utilidad única de "mapa paralelo" por llamada. Cada lote crea su
// propio pool de rayon, reparte las tareas, espera los resultados bajo un
// timeout global y descarta el pool al terminar.
use crate::errors::{EngineError, Result};
use crate::settings::EngineSettings;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, warn};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Outcome<T> = std::result::Result<Result<T>, Box<dyn Any + Send>>;

/// Número de hilos para un lote: `min(paralelismo disponible, tope, tareas)`,
/// nunca menos de uno.
pub fn worker_count(max_workers: usize, tasks: usize) -> usize {
  let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  available.min(max_workers).min(tasks).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "pánico sin mensaje".to_string()
  }
}

/// Ejecutor de lotes con pool acotado por llamada.
///
/// Los fallos y pánicos de una tarea se registran y se descartan; el lote
/// sólo falla si no termina dentro de `timeout`. En ese caso se cancelan las
/// tareas aún en cola, se espera `grace` a las que están en curso y se
/// devuelve `EngineError::Timeout`. Las tareas de rayon no se pueden
/// interrumpir: lo que llegue después de la gracia se pierde con el canal.
#[derive(Debug, Clone)]
pub struct ParallelMap {
  label: String,
  max_workers: usize,
  timeout: Duration,
  grace: Duration,
}

impl ParallelMap {
  pub fn new(label: impl Into<String>, settings: &EngineSettings) -> Self {
    Self { label: label.into(),
           max_workers: settings.max_workers,
           timeout: settings.batch_timeout,
           grace: settings.shutdown_grace }
  }

  pub fn with_timeout(mut self, timeout: Duration, grace: Duration) -> Self {
    self.timeout = timeout;
    self.grace = grace;
    self
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  /// Aplica `task` a cada elemento y devuelve los resultados correctos en el
  /// orden de entrada.
  pub fn run<I, T, F>(&self, items: Vec<I>, task: F) -> Result<Vec<T>>
    where I: fmt::Debug + Send + 'static,
          T: Send + 'static,
          F: Fn(I) -> Result<T> + Send + Sync + 'static
  {
    let total = items.len();
    if total == 0 {
      return Ok(Vec::new());
    }
    let workers = worker_count(self.max_workers, total);
    let prefix = self.label.clone();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers)
                                              .thread_name(move |i| format!("{}-{}", prefix, i))
                                              .build()
                                              .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
    debug!("lote '{}': {} tareas en {} hilos", self.label, total, workers);

    let (tx, rx) = crossbeam_channel::unbounded::<(usize, Outcome<T>)>();
    let cancelled = Arc::new(AtomicBool::new(false));
    let task = Arc::new(task);
    let mut names = Vec::with_capacity(total);
    for (idx, item) in items.into_iter().enumerate() {
      names.push(format!("{:?}", item));
      let tx = tx.clone();
      let cancelled = Arc::clone(&cancelled);
      let task = Arc::clone(&task);
      pool.spawn(move || {
            if cancelled.load(Ordering::Acquire) {
              return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(item)));
            let _ = tx.send((idx, outcome));
          });
    }
    drop(tx);

    let started = Instant::now();
    let deadline = started + self.timeout;
    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut received = 0usize;
    while received < total {
      match rx.recv_deadline(deadline) {
        Ok((idx, outcome)) => {
          received += 1;
          match outcome {
            Ok(Ok(value)) => slots[idx] = Some(value),
            Ok(Err(e)) => warn!("lote '{}': se descarta {}: {}", self.label, names[idx], e),
            Err(payload) => {
              warn!("lote '{}': pánico en {}: {}", self.label, names[idx], panic_message(payload.as_ref()))
            }
          }
        }
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    if received < total {
      cancelled.store(true, Ordering::Release);
      let grace_deadline = Instant::now() + self.grace;
      let mut drained = 0usize;
      while rx.recv_deadline(grace_deadline).is_ok() {
        drained += 1;
      }
      let waited_ms = started.elapsed().as_millis() as u64;
      warn!("lote '{}' cancelado: {}/{} tareas a tiempo, {} más durante la gracia",
            self.label, received, total, drained);
      return Err(EngineError::Timeout { label: self.label.clone(), completed: received, total, waited_ms });
    }
    debug!("lote '{}' completado en {} ms", self.label, started.elapsed().as_millis());
    Ok(slots.into_iter().flatten().collect())
  }
}
