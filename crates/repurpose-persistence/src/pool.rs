//! Pool acotado de conexiones SQLite.
//!
//! Una conexión ("lease") está siempre en exactamente uno de tres estados:
//! disponible (dentro del canal acotado), en uso (registrada en `in_use` y
//! poseída por un `PooledConnection`) o destruida. El total de conexiones
//! vivas nunca supera `max_size`: antes de conectar se reserva un hueco con
//! compare-and-swap sobre el contador.
use crate::config::PoolConfig;
use crate::errors::PoolError;
use crate::tuning::SqliteTuning;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use diesel::r2d2::ConnectionManager;
use diesel::SqliteConnection;
use r2d2::{CustomizeConnection, ManageConnection};
use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type DbConn = SqliteConnection;
pub type LeaseId = Uuid;

/// Primera revisión de fugas tras el arranque.
const FIRST_LEAK_CHECK: Duration = Duration::from_secs(60);
const LEAK_TRACE_LINES: usize = 20;
/// Tramo máximo de espera antes de volver a intentar reservar un hueco.
const WAIT_SLICE: Duration = Duration::from_millis(25);

struct Lease {
  id: LeaseId,
  conn: DbConn,
  created_at: Instant,
  last_used: Instant,
}

impl Lease {
  fn new(conn: DbConn) -> Self {
    let now = Instant::now();
    Self { id: Uuid::new_v4(), conn, created_at: now, last_used: now }
  }
}

/// Contexto de adquisición guardado para diagnosticar fugas.
struct AcquisitionTrace {
  thread: String,
  context: Option<String>,
  acquired_at: DateTime<Utc>,
  since: Instant,
  backtrace: Backtrace,
}

impl AcquisitionTrace {
  fn capture(context: Option<&str>) -> Self {
    let current = std::thread::current();
    Self { thread: current.name().unwrap_or("<sin nombre>").to_string(),
           context: context.map(str::to_string),
           acquired_at: Utc::now(),
           since: Instant::now(),
           backtrace: Backtrace::capture() }
  }

  fn frames(&self) -> String {
    match self.backtrace.status() {
      BacktraceStatus::Captured => {
        self.backtrace.to_string().lines().take(LEAK_TRACE_LINES).collect::<Vec<_>>().join("\n")
      }
      _ => "<backtrace no capturado; exporta RUST_BACKTRACE=1>".to_string(),
    }
  }
}

/// Conexión retenida más allá de lo esperado.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
  pub lease_id: LeaseId,
  pub thread: String,
  pub context: Option<String>,
  pub acquired_at: DateTime<Utc>,
  pub held_ms: u64,
  pub trace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStatistics {
  pub total: usize,
  pub available: usize,
  pub in_use: usize,
  pub requests: u64,
  pub creations: u64,
  pub timeouts: u64,
  pub validation_failures: u64,
  pub average_wait_ms: f64,
  pub longest_wait_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
  pub closed_available: usize,
  pub revoked_in_use: usize,
}

#[derive(Default)]
struct Counters {
  requests: AtomicU64,
  served: AtomicU64,
  creations: AtomicU64,
  timeouts: AtomicU64,
  validation_failures: AtomicU64,
  cumulative_wait_ms: AtomicU64,
  longest_wait_ms: AtomicU64,
}

impl Counters {
  fn reset(&self) {
    for c in [&self.requests,
              &self.served,
              &self.creations,
              &self.timeouts,
              &self.validation_failures,
              &self.cumulative_wait_ms,
              &self.longest_wait_ms]
    {
      c.store(0, Ordering::Relaxed);
    }
  }
}

struct PoolInner {
  config: PoolConfig,
  manager: ConnectionManager<DbConn>,
  tuning: SqliteTuning,
  available_tx: Sender<Lease>,
  available_rx: Receiver<Lease>,
  in_use: DashMap<LeaseId, Instant>,
  traces: DashMap<LeaseId, AcquisitionTrace>,
  total: AtomicUsize,
  peak: AtomicUsize,
  closed: AtomicBool,
  leak_alarm: AtomicBool,
  counters: Counters,
}

impl PoolInner {
  fn try_reserve(&self) -> bool {
    let max = self.config.max_size;
    let mut current = self.total.load(Ordering::SeqCst);
    loop {
      if current >= max {
        return false;
      }
      match self.total.compare_exchange_weak(current, current + 1, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => {
          self.peak.fetch_max(current + 1, Ordering::SeqCst);
          return true;
        }
        Err(actual) => current = actual,
      }
    }
  }

  fn decrement_total(&self) {
    let _ = self.total.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
  }

  fn open_lease(&self) -> Result<Lease, PoolError> {
    let mut conn = self.manager.connect()?;
    self.tuning.on_acquire(&mut conn)?;
    self.counters.creations.fetch_add(1, Ordering::Relaxed);
    let lease = Lease::new(conn);
    log::debug!("Nueva conexión {} (total {})", lease.id, self.total.load(Ordering::SeqCst));
    Ok(lease)
  }

  fn destroy(&self, lease: Lease) {
    self.decrement_total();
    log::debug!("Conexión {} destruida tras {:?}", lease.id, lease.created_at.elapsed());
  }

  /// Crea las conexiones iniciales (al menos una). Que no se pueda abrir
  /// ninguna es fatal.
  fn populate(&self) -> Result<(), PoolError> {
    let target = self.config.min_size.max(1);
    let mut created = 0;
    let mut first_error: Option<String> = None;
    for _ in 0..target {
      if !self.try_reserve() {
        break;
      }
      match self.open_lease() {
        Ok(lease) => match self.available_tx.try_send(lease) {
          Ok(()) => created += 1,
          Err(e) => self.destroy(e.into_inner()),
        },
        Err(e) => {
          self.decrement_total();
          log::warn!("Fallo al crear conexión inicial: {}", e);
          first_error.get_or_insert_with(|| e.to_string());
        }
      }
    }
    if created == 0 {
      return Err(PoolError::InitialPopulation(first_error.unwrap_or_else(|| "sin detalle".to_string())));
    }
    log::info!("Pool inicializado con {} conexiones (mín {}, máx {})",
               created, self.config.min_size, self.config.max_size);
    Ok(())
  }

  fn validate(&self, lease: &mut Lease) -> bool {
    !self.manager.has_broken(&mut lease.conn) && self.manager.is_valid(&mut lease.conn).is_ok()
  }

  fn backoff(&self, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    self.config.retry_backoff.saturating_mul(factor)
  }

  /// Reserva un hueco y abre una conexión; `None` si el pool está lleno.
  fn open_reserved(&self) -> Option<Result<Lease, PoolError>> {
    if !self.try_reserve() {
      return None;
    }
    // Un cierre concurrente pudo poner el total a cero tras la reserva.
    if self.closed.load(Ordering::SeqCst) {
      self.decrement_total();
      return Some(Err(PoolError::Closed));
    }
    Some(self.open_lease().inspect_err(|_| self.decrement_total()))
  }

  /// Disponible -> nueva (si hay hueco) -> espera acotada. La espera se hace
  /// en tramos cortos para aprovechar huecos liberados por conexiones
  /// destruidas, que nunca llegan al canal.
  fn next_lease(&self) -> Result<Lease, PoolError> {
    if let Ok(lease) = self.available_rx.try_recv() {
      return Ok(lease);
    }
    if let Some(opened) = self.open_reserved() {
      return opened;
    }
    self.check_leaks_on_pressure();
    let waiting = Instant::now();
    let deadline = waiting + self.config.max_wait;
    loop {
      let now = Instant::now();
      if now >= deadline {
        break;
      }
      match self.available_rx.recv_timeout((deadline - now).min(WAIT_SLICE)) {
        Ok(lease) => return Ok(lease),
        Err(RecvTimeoutError::Disconnected) => return Err(PoolError::Closed),
        Err(RecvTimeoutError::Timeout) => {}
      }
      if self.closed.load(Ordering::SeqCst) {
        return Err(PoolError::Closed);
      }
      if let Some(opened) = self.open_reserved() {
        return opened;
      }
    }
    self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
    let waited_ms = waiting.elapsed().as_millis() as u64;
    log::warn!("Sin conexiones libres tras {} ms (en uso {}/{})",
               waited_ms,
               self.in_use.len(),
               self.config.max_size);
    Err(PoolError::Timeout { attempts: 1, waited_ms })
  }

  fn acquire(self: &Arc<Self>, context: Option<&str>) -> Result<PooledConnection, PoolError> {
    if self.closed.load(Ordering::SeqCst) {
      return Err(PoolError::Closed);
    }
    self.counters.requests.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    let attempts = self.config.retry_attempts;
    let mut attempt = 0u32;
    let mut discarded = 0usize;
    let mut last_failure: Option<PoolError> = None;
    loop {
      if self.closed.load(Ordering::SeqCst) {
        return Err(PoolError::Closed);
      }
      match self.next_lease() {
        Ok(mut lease) => {
          if self.validate(&mut lease) {
            return Ok(self.check_out(lease, started, context));
          }
          self.counters.validation_failures.fetch_add(1, Ordering::Relaxed);
          log::warn!("La conexión {} no superó la validación; se descarta", lease.id);
          self.destroy(lease);
          discarded += 1;
          // Las conexiones obsoletas se purgan sin consumir intentos.
          if discarded <= self.config.max_size {
            continue;
          }
          last_failure = Some(PoolError::Connection("las conexiones nuevas no superan la validación".into()));
        }
        Err(PoolError::Closed) => return Err(PoolError::Closed),
        Err(e) => last_failure = Some(e),
      }
      attempt += 1;
      if attempt >= attempts {
        break;
      }
      let delay = self.backoff(attempt);
      log::debug!("Reintento {}/{} de adquisición en {:?}", attempt + 1, attempts, delay);
      std::thread::sleep(delay);
    }
    let waited_ms = started.elapsed().as_millis() as u64;
    let err = match last_failure {
      Some(PoolError::Timeout { .. }) => PoolError::Timeout { attempts, waited_ms },
      Some(other) => PoolError::Exhausted { attempts, reason: other.to_string() },
      None => PoolError::Exhausted { attempts, reason: "sin detalle".to_string() },
    };
    log::error!("Adquisición fallida: {}", err);
    Err(err)
  }

  fn check_out(self: &Arc<Self>, mut lease: Lease, started: Instant, context: Option<&str>) -> PooledConnection {
    let waited_ms = started.elapsed().as_millis() as u64;
    self.counters.served.fetch_add(1, Ordering::Relaxed);
    self.counters.cumulative_wait_ms.fetch_add(waited_ms, Ordering::Relaxed);
    self.counters.longest_wait_ms.fetch_max(waited_ms, Ordering::Relaxed);
    lease.last_used = Instant::now();
    self.in_use.insert(lease.id, lease.last_used);
    self.traces.insert(lease.id, AcquisitionTrace::capture(context));
    self.check_leaks_on_pressure();
    PooledConnection { pool: Arc::clone(self), lease: Some(lease) }
  }

  /// Revisión proactiva de fugas al cruzar el umbral de ocupación; se
  /// rearma cuando la ocupación vuelve a bajar.
  fn check_leaks_on_pressure(&self) {
    let busy = self.in_use.len();
    if busy >= self.config.leak_check_watermark() {
      if !self.leak_alarm.swap(true, Ordering::SeqCst) {
        log::warn!("Ocupación del pool en {}/{}; revisando posibles fugas", busy, self.config.max_size);
        self.report_leaks();
      }
    } else {
      self.leak_alarm.store(false, Ordering::SeqCst);
    }
  }

  fn give_back(&self, mut lease: Lease) {
    self.traces.remove(&lease.id);
    // Con el pool cerrado el total ya está a cero: sólo se suelta.
    if self.closed.load(Ordering::SeqCst) {
      self.in_use.remove(&lease.id);
      log::debug!("Conexión {} devuelta con el pool cerrado; se cierra", lease.id);
      return;
    }
    if self.in_use.remove(&lease.id).is_none() {
      log::warn!("Conexión {} devuelta tras ser revocada; se cierra", lease.id);
      return;
    }
    if self.manager.has_broken(&mut lease.conn) {
      log::warn!("Conexión {} rota al devolverse; se destruye", lease.id);
      self.destroy(lease);
      return;
    }
    lease.last_used = Instant::now();
    if let Err(e) = self.available_tx.try_send(lease) {
      let lease = e.into_inner();
      log::warn!("El conjunto de disponibles rechazó la conexión {}; se destruye", lease.id);
      self.destroy(lease);
      return;
    }
    // El cierre pudo vaciar el canal justo antes del envío.
    if self.closed.load(Ordering::SeqCst) {
      self.drain_available();
    }
  }

  fn drain_available(&self) -> usize {
    self.available_rx.try_iter().count()
  }

  fn reap_idle(&self) -> usize {
    let drained: Vec<Lease> = self.available_rx.try_iter().collect();
    let mut reaped = 0;
    for lease in drained {
      if lease.last_used.elapsed() > self.config.max_idle && self.total.load(Ordering::SeqCst) > self.config.min_size {
        self.destroy(lease);
        reaped += 1;
      } else if let Err(e) = self.available_tx.try_send(lease) {
        self.destroy(e.into_inner());
      }
    }
    if reaped > 0 {
      log::info!("Cerradas {} conexiones inactivas (total {})", reaped, self.total.load(Ordering::SeqCst));
    }
    reaped
  }

  fn statistics(&self) -> PoolStatistics {
    let c = &self.counters;
    let served = c.served.load(Ordering::Relaxed);
    let cumulative = c.cumulative_wait_ms.load(Ordering::Relaxed);
    PoolStatistics { total: self.total.load(Ordering::SeqCst),
                     available: self.available_rx.len(),
                     in_use: self.in_use.len(),
                     requests: c.requests.load(Ordering::Relaxed),
                     creations: c.creations.load(Ordering::Relaxed),
                     timeouts: c.timeouts.load(Ordering::Relaxed),
                     validation_failures: c.validation_failures.load(Ordering::Relaxed),
                     average_wait_ms: if served == 0 { 0.0 } else { cumulative as f64 / served as f64 },
                     longest_wait_ms: c.longest_wait_ms.load(Ordering::Relaxed) }
  }

  fn log_statistics(&self) -> PoolStatistics {
    let stats = self.statistics();
    log::info!("Pool: total={} disponibles={} en_uso={} peticiones={} creadas={} timeouts={} validaciones_fallidas={} espera_media={:.1}ms espera_max={}ms",
               stats.total,
               stats.available,
               stats.in_use,
               stats.requests,
               stats.creations,
               stats.timeouts,
               stats.validation_failures,
               stats.average_wait_ms,
               stats.longest_wait_ms);
    self.counters.reset();
    stats
  }

  fn report_leaks(&self) -> Vec<LeakReport> {
    let mut reports: Vec<LeakReport> = self.traces
                                           .iter()
                                           .map(|entry| LeakReport { lease_id: *entry.key(),
                                                                     thread: entry.thread.clone(),
                                                                     context: entry.context.clone(),
                                                                     acquired_at: entry.acquired_at,
                                                                     held_ms: entry.since.elapsed().as_millis() as u64,
                                                                     trace: entry.frames() })
                                           .collect();
    reports.sort_by(|a, b| b.held_ms.cmp(&a.held_ms));
    for r in &reports {
      log::warn!("Posible fuga: conexión {} retenida {} ms por el hilo '{}'{} desde {}\n{}",
                 r.lease_id,
                 r.held_ms,
                 r.thread,
                 r.context.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default(),
                 r.acquired_at.to_rfc3339(),
                 r.trace);
    }
    reports
  }

  fn shutdown(&self) -> ShutdownReport {
    if self.closed.swap(true, Ordering::SeqCst) {
      return ShutdownReport::default();
    }
    let revoked: Vec<LeaseId> = self.in_use.iter().map(|e| *e.key()).collect();
    for id in &revoked {
      log::warn!("Conexión {} seguía en uso durante el cierre; se revoca", id);
      self.in_use.remove(id);
    }
    self.traces.clear();
    let closed_available = self.drain_available();
    self.total.store(0, Ordering::SeqCst);
    self.counters.reset();
    log::info!("Pool cerrado: {} conexiones libres cerradas, {} revocadas", closed_available, revoked.len());
    ShutdownReport { closed_available, revoked_in_use: revoked.len() }
  }
}

struct Maintenance {
  stop: Sender<()>,
  handle: JoinHandle<()>,
}

fn spawn_maintenance(inner: Weak<PoolInner>, config: &PoolConfig) -> Option<Maintenance> {
  let (stop, stop_rx) = bounded::<()>(1);
  let reap_every = config.maintenance_interval;
  let stats_every = config.stats_interval;
  let leaks_every = config.leak_check_interval;
  let tick = reap_every.min(stats_every).min(leaks_every).max(Duration::from_millis(10));
  let spawned = std::thread::Builder::new().name("db-connection-maintenance".into()).spawn(move || {
    let start = Instant::now();
    let mut last_reap = start;
    let mut last_stats = start;
    let mut next_leak_check = start + FIRST_LEAK_CHECK.min(leaks_every);
    loop {
      match stop_rx.recv_timeout(tick) {
        Err(RecvTimeoutError::Timeout) => {}
        _ => break,
      }
      let Some(pool) = inner.upgrade() else {
        break;
      };
      let now = Instant::now();
      if now.duration_since(last_reap) >= reap_every {
        pool.reap_idle();
        last_reap = now;
      }
      if now.duration_since(last_stats) >= stats_every {
        pool.log_statistics();
        last_stats = now;
      }
      if now >= next_leak_check {
        pool.report_leaks();
        next_leak_check = now + leaks_every;
      }
    }
    log::debug!("Hilo de mantenimiento del pool detenido");
  });
  match spawned {
    Ok(handle) => Some(Maintenance { stop, handle }),
    Err(e) => {
      log::warn!("No se pudo lanzar el hilo de mantenimiento: {}", e);
      None
    }
  }
}

/// Pool de conexiones compartido entre hilos.
pub struct ConnectionPool {
  inner: Arc<PoolInner>,
  maintenance: Mutex<Option<Maintenance>>,
}

impl ConnectionPool {
  pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
    config.validate()?;
    let target = config.target()?;
    if config.user.is_some() || config.password.is_some() {
      log::debug!("SQLite no usa usuario/contraseña; se ignoran");
    }
    let manager = ConnectionManager::<DbConn>::new(target.connection_string());
    let (available_tx, available_rx) = bounded(config.max_size);
    let inner = Arc::new(PoolInner { tuning: SqliteTuning::new(config.validation_timeout),
                                     manager,
                                     available_tx,
                                     available_rx,
                                     in_use: DashMap::new(),
                                     traces: DashMap::new(),
                                     total: AtomicUsize::new(0),
                                     peak: AtomicUsize::new(0),
                                     closed: AtomicBool::new(false),
                                     leak_alarm: AtomicBool::new(false),
                                     counters: Counters::default(),
                                     config });
    inner.populate()?;
    let maintenance = spawn_maintenance(Arc::downgrade(&inner), &inner.config);
    Ok(Self { inner, maintenance: Mutex::new(maintenance) })
  }

  pub fn from_env() -> Result<Self, PoolError> {
    Self::new(PoolConfig::from_env()?)
  }

  pub fn config(&self) -> &PoolConfig {
    &self.inner.config
  }

  /// Obtiene una conexión validada; se devuelve al soltar el guard.
  pub fn acquire(&self) -> Result<PooledConnection, PoolError> {
    self.inner.acquire(None)
  }

  /// Como `acquire`, con una etiqueta que aparece en los informes de fugas.
  pub fn acquire_for(&self, context: &str) -> Result<PooledConnection, PoolError> {
    self.inner.acquire(Some(context))
  }

  pub fn release(&self, conn: PooledConnection) {
    drop(conn);
  }

  /// Ejecuta `f` con una conexión del pool, liberándola en cualquier salida.
  pub fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where F: FnOnce(&mut DbConn) -> Result<T, E>,
          E: From<PoolError>
  {
    let mut conn = self.acquire()?;
    f(&mut conn)
  }

  pub fn statistics(&self) -> PoolStatistics {
    self.inner.statistics()
  }

  /// Registra las estadísticas agregadas y pone los contadores a cero.
  pub fn log_statistics(&self) -> PoolStatistics {
    self.inner.log_statistics()
  }

  pub fn report_leaks(&self) -> Vec<LeakReport> {
    self.inner.report_leaks()
  }

  pub fn reap_idle_connections(&self) -> usize {
    self.inner.reap_idle()
  }

  pub fn total_connections(&self) -> usize {
    self.inner.total.load(Ordering::SeqCst)
  }

  pub fn available_connections(&self) -> usize {
    self.inner.available_rx.len()
  }

  pub fn in_use_connections(&self) -> usize {
    self.inner.in_use.len()
  }

  /// Máximo histórico de conexiones vivas simultáneas.
  pub fn peak_connections(&self) -> usize {
    self.inner.peak.load(Ordering::SeqCst)
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::SeqCst)
  }

  /// Cierra las conexiones libres y revoca las que siguen en uso: éstas se
  /// cierran cuando su guard las devuelve.
  pub fn shutdown(&self) -> ShutdownReport {
    self.stop_maintenance();
    self.inner.shutdown()
  }

  fn stop_maintenance(&self) {
    let taken = match self.maintenance.lock() {
      Ok(mut guard) => guard.take(),
      Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(m) = taken {
      let _ = m.stop.send(());
      if m.handle.join().is_err() {
        log::warn!("El hilo de mantenimiento terminó con pánico");
      }
    }
  }
}

impl Drop for ConnectionPool {
  fn drop(&mut self) {
    self.stop_maintenance();
  }
}

impl fmt::Debug for ConnectionPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionPool")
     .field("total", &self.total_connections())
     .field("available", &self.available_connections())
     .field("in_use", &self.in_use_connections())
     .field("closed", &self.is_closed())
     .finish()
  }
}

/// Guard de una conexión en uso. Se devuelve al pool en `Drop`.
pub struct PooledConnection {
  pool: Arc<PoolInner>,
  lease: Option<Lease>,
}

impl PooledConnection {
  pub fn id(&self) -> LeaseId {
    self.lease.as_ref().map(|l| l.id).unwrap_or_default()
  }
}

impl Deref for PooledConnection {
  type Target = DbConn;

  fn deref(&self) -> &DbConn {
    &self.lease.as_ref().expect("conexión presente hasta drop").conn
  }
}

impl DerefMut for PooledConnection {
  fn deref_mut(&mut self) -> &mut DbConn {
    &mut self.lease.as_mut().expect("conexión presente hasta drop").conn
  }
}

impl Drop for PooledConnection {
  fn drop(&mut self) {
    if let Some(lease) = self.lease.take() {
      self.pool.give_back(lease);
    }
  }
}

impl fmt::Debug for PooledConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PooledConnection").field("id", &self.id()).finish()
  }
}
