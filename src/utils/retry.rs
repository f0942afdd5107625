//! Reintentos acotados con backoff
//!
//! Bucle de reintentos explícito (nada de recursión con contadores manuales):
//! el número máximo de intentos y la función de backoff son parámetros, así
//! que la condición de terminación se puede testear de forma aislada.

use std::future::Future;
use std::time::Duration;

/// Estrategia de espera entre intentos
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// base * 2^(attempt-1): 1s, 2s, 4s...
    Exponential(Duration),
    /// base * attempt: 100ms, 200ms, 300ms...
    Linear(Duration),
}

impl Backoff {
    /// Espera a aplicar después del intento `attempt` (empezando en 1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Exponential(base) => *base * 2u32.saturating_pow(attempt.saturating_sub(1)),
            Backoff::Linear(base) => *base * attempt,
        }
    }
}

/// Ejecutar una operación con reintentos acotados.
///
/// `op` recibe el número de intento (1-based). Solo se reintenta cuando
/// `is_transient` clasifica el error como transitorio; los errores de
/// validación/cliente se devuelven de inmediato.
pub async fn run_with_retry<T, E, F, Fut, P>(
    max_attempts: u32,
    backoff: Backoff,
    mut op: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_attempts || !is_transient(&error) {
                    return Err(error);
                }
                let delay = backoff.delay_for(attempt);
                log::warn!(
                    "Attempt {}/{} failed, retrying in {:?}",
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
