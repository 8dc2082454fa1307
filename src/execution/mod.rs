//! Utilitários de execução local: logs em arquivo, scripts de shell e
//! map paralelo sobre um pool de threads.

pub mod logs;
pub mod script;

pub use logs::{write_error_log, write_exec_log, write_time_log, ErrorLogMode, LogOptions};
pub use script::{execute_script, format_duration, ScriptOptions, ScriptReport};

use rayon::prelude::*;
use tracing::debug;

use crate::error::{ExecutionError, Result};

/// Aplica `f` a cada item em um pool de `workers` threads; resultados na ordem de entrada
pub fn parallel_map<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| ExecutionError::WorkerPool(e.to_string()))?;

    debug!(workers = pool.current_num_threads(), items = items.len(), "Executando map paralelo");
    Ok(pool.install(|| items.into_par_iter().map(f).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_preserves_order() {
        let items: Vec<u64> = (0..100).collect();
        let result = parallel_map(items, 4, |x| x * x).unwrap();
        assert_eq!(result.len(), 100);
        assert_eq!(result[9], 81);
        assert!(result.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_zero_workers_uses_one() {
        let result = parallel_map(vec!["a", "b"], 0, str::to_uppercase).unwrap();
        assert_eq!(result, vec!["A", "B"]);
    }
}
