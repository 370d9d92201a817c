use repurpose_domain::EntityKind;
use repurpose_engine::{EngineSettings, ScoringOrchestrator};
use repurpose_persistence::{ConnectionPool, EntityCache, EntityGraph, PoolConfig};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pequeño menú interactivo sobre el motor de reposicionamiento.
///
/// La conexión se configura con `REPURPOSE_DB_URL` y compañía (ver `.env`).
/// Los nombres introducidos se resuelven por alias antes de consultar, así
/// que se puede escribir "aspirin" o directamente el id canónico.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();

    let pool = Arc::new(ConnectionPool::new(PoolConfig::from_env()?)?);
    let graph = EntityGraph::new(Arc::clone(&pool), Arc::new(EntityCache::new()))?;
    let settings = EngineSettings::from_env()?;
    info!("Motor listo: {} hilos por lote, timeout {:?}", settings.max_workers, settings.batch_timeout);
    let engine = ScoringOrchestrator::new(graph, settings);

    loop {
        println!("\n== Reposicionamiento de fármacos ==");
        println!("1) Ranking de fármacos para una enfermedad");
        println!("2) Descubrir candidatos para una enfermedad");
        println!("3) Puntuar un par fármaco / enfermedad");
        println!("4) Enfermedades similares");
        println!("5) Candidatos por red a partir de un gen");
        println!("6) Enfermedades huérfanas");
        println!("7) Estadísticas del pool");
        println!("8) Salir");
        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" | "2" => {
                let disease = match resolve(&engine, EntityKind::Disease, "Enfermedad (nombre o id): ")? {
                    Some(id) => id,
                    None => continue,
                };
                let max = read_count("Máximo de resultados [10]: ", 10)?;
                let found = if choice.trim() == "1" { engine.rank(&disease, max) } else { engine.discover(&disease, max) };
                match found {
                    Ok(results) if results.is_empty() => println!("Sin candidatos para {}", disease),
                    Ok(results) => {
                        for (i, r) in results.iter().enumerate() {
                            println!("{:>2}. {}", i + 1, r);
                            println!("    Indicación: {}", r.current_indication());
                            println!("    Mecanismo: {}", r.mechanism_of_action());
                        }
                    }
                    Err(e) => eprintln!("Error calculando candidatos: {}", e),
                }
            }
            "3" => {
                let drug = match resolve(&engine, EntityKind::Drug, "Fármaco (nombre o id): ")? {
                    Some(id) => id,
                    None => continue,
                };
                let disease = match resolve(&engine, EntityKind::Disease, "Enfermedad (nombre o id): ")? {
                    Some(id) => id,
                    None => continue,
                };
                match engine.score_breakdown(&drug, &disease) {
                    Ok(b) => {
                        println!("Cobertura de genes:   {:.3}", b.gene_overlap);
                        println!("Cobertura de rutas:   {:.3}", b.pathway_overlap);
                        println!("Fármacos similares:   {:.3}", b.similar_drugs);
                        println!("Similitud química:    {:.3}", b.chemical);
                        println!("Score básico:         {:.3}", b.total);
                    }
                    Err(e) => eprintln!("Error puntuando el par: {}", e),
                }
                match engine.comprehensive_score(&drug, &disease) {
                    Ok(s) => println!("Score completo:       {:.3}", s),
                    Err(e) => eprintln!("Error en el score completo: {}", e),
                }
            }
            "4" => {
                let disease = match resolve(&engine, EntityKind::Disease, "Enfermedad (nombre o id): ")? {
                    Some(id) => id,
                    None => continue,
                };
                match engine.discovery().similar_diseases(&disease) {
                    Ok(similar) if similar.is_empty() => println!("Ninguna enfermedad supera el umbral"),
                    Ok(similar) => {
                        println!("\nENFERMEDAD           | PUNTOS");
                        println!("-----------------------------");
                        for d in similar {
                            println!("{:<20} | {}", d.disease_id, d.score);
                        }
                    }
                    Err(e) => eprintln!("Error buscando similares: {}", e),
                }
            }
            "5" => {
                let gene = match resolve(&engine, EntityKind::Gene, "Gen semilla (nombre o id): ")? {
                    Some(id) => id,
                    None => continue,
                };
                let depth = read_count(&format!("Profundidad [{}]: ", engine.settings().network_depth),
                                       engine.settings().network_depth)?;
                match engine.discovery().network_traversal(&gene, depth) {
                    Ok(t) => println!("{}", serde_json::to_string_pretty(&t)?),
                    Err(e) => eprintln!("Error recorriendo la red: {}", e),
                }
            }
            "6" => {
                let max = read_count("Candidatos por enfermedad [3]: ", 3)?;
                let limit = read_count("Enfermedades a procesar [5]: ", 5)?;
                match engine.candidates_for_orphans(max, limit) {
                    Ok(found) if found.is_empty() => println!("No hay enfermedades huérfanas"),
                    Ok(found) => {
                        for (disease, results) in found {
                            println!("{}:", disease);
                            for r in results {
                                println!("    {}", r);
                            }
                        }
                    }
                    Err(e) => eprintln!("Error con las enfermedades huérfanas: {}", e),
                }
            }
            "7" => {
                let stats = pool.log_statistics();
                println!("{}", serde_json::to_string_pretty(&stats)?);
                println!("Pico de conexiones: {}", pool.peak_connections());
            }
            "8" => {
                let report = pool.shutdown();
                println!("Saliendo... ({} conexiones cerradas, {} revocadas)", report.closed_available, report.revoked_in_use);
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

/// Pide un nombre y lo resuelve a id canónico; `None` si no existe.
fn resolve(engine: &ScoringOrchestrator, kind: EntityKind, msg: &str) -> io::Result<Option<String>> {
    let raw = prompt(msg)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match engine.graph().resolve(kind, raw) {
        Ok(Some(id)) => Ok(Some(id)),
        // Puede que ya sea un id canónico.
        Ok(None) if engine.graph().exists(kind, raw).unwrap_or(false) => Ok(Some(raw.to_string())),
        Ok(None) => {
            eprintln!("No se encontró {} '{}'", kind, raw);
            Ok(None)
        }
        Err(e) => {
            eprintln!("Error resolviendo '{}': {}", raw, e);
            Ok(None)
        }
    }
}

fn read_count(msg: &str, default: usize) -> io::Result<usize> {
    let s = prompt(msg)?;
    if s.trim().is_empty() {
        return Ok(default);
    }
    match s.trim().parse() {
        Ok(n) => Ok(n),
        Err(_) => {
            eprintln!("Número inválido, se usa {}", default);
            Ok(default)
        }
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
