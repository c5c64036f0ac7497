//! Coordenação single-flight por chave exata.
//!
//! Garante no máximo uma computação em voo por chave: o primeiro
//! chamador vira líder e executa; chamadores concorrentes da mesma
//! chave viram seguidores e recebem uma cópia idêntica do resultado do
//! líder (sucesso ou falha). Chaves distintas prosseguem em paralelo
//! sem qualquer limite global.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;

/// Papel que um chamador assumiu ao executar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Executou a computação.
    Leader,
    /// Recebeu o resultado do líder.
    Follower,
}

/// Resultado entregue a um chamador.
#[derive(Debug)]
pub struct FlightOutcome<T> {
    /// Valor publicado pelo líder.
    pub value: T,

    /// Papel deste chamador.
    pub role: FlightRole,
}

/// Coordenador single-flight.
///
/// `T` é clonado para cada seguidor; falhas devem viajar em uma forma
/// clonável (ex.: `Result<_, Arc<E>>`).
///
/// O mapa de marcadores usa `std::sync::Mutex`: nenhum lock atravessa
/// um `await`, e isso permite que o guard limpe o marcador dentro de
/// `Drop` em qualquer caminho de saída do líder - erro, panic ou
/// cancelamento do future. Nenhuma chave fica presa com um marcador
/// fantasma.
pub struct SingleFlight<T: Clone> {
    inflight: Mutex<HashMap<String, broadcast::Sender<T>>>,
}

/// Remove o marcador da chave quando o líder sai sem publicar.
struct FlightGuard<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    armed: bool,
}

impl<T: Clone> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut inflight) = self.flight.inflight.lock() {
                // Derruba o sender: seguidores acordam com Closed e
                // disputam uma nova liderança
                inflight.remove(self.key);
            }
        }
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    /// Cria um coordenador vazio.
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Número de chaves com computação em voo.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Executa `compute` com dedup por chave.
    ///
    /// O primeiro chamador de uma chave executa a computação e publica
    /// o resultado para todos os seguidores que chegaram enquanto ela
    /// rodava. Um seguidor que desiste (timeout, cancelamento) apenas
    /// solta o receiver; o líder roda até o fim de qualquer forma.
    pub async fn execute<F, Fut>(&self, exact_key: &str, compute: F) -> FlightOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let receiver = {
            let mut inflight = self
                .inflight
                .lock()
                .expect("lock do single-flight envenenado");
            match inflight.get(exact_key) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    inflight.insert(exact_key.to_string(), sender);
                    None
                }
            }
        };

        if let Some(mut rx) = receiver {
            return match rx.recv().await {
                Ok(value) => FlightOutcome {
                    value,
                    role: FlightRole::Follower,
                },
                // O líder saiu sem publicar (panic ou cancelamento):
                // recomeça e disputa a liderança
                Err(_) => Box::pin(self.execute(exact_key, compute)).await,
            };
        }

        // Caminho do líder
        let mut guard = FlightGuard {
            flight: self,
            key: exact_key,
            armed: true,
        };

        let value = compute().await;

        // Publica e limpa o marcador no caminho normal; o guard fica
        // responsável apenas pelos caminhos anormais
        {
            let mut inflight = self
                .inflight
                .lock()
                .expect("lock do single-flight envenenado");
            if let Some(sender) = inflight.remove(exact_key) {
                // Sem seguidores o send retorna Err; irrelevante
                let _ = sender.send(value.clone());
            }
        }
        guard.armed = false;

        FlightOutcome {
            value,
            role: FlightRole::Leader,
        }
    }
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn join_all<T>(handles: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_single_caller_is_leader() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let outcome = flight.execute("k", || async { 7 }).await;

        assert_eq!(outcome.value, 7);
        assert_eq!(outcome.role, FlightRole::Leader);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_one_computation() {
        let flight: Arc<SingleFlight<u64>> = Arc::new(SingleFlight::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = Arc::clone(&flight);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                flight
                    .execute("shared", || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42u64
                    })
                    .await
            }));
        }

        let outcomes = join_all(handles).await;

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(|o| o.value == 42));
        let leaders = outcomes
            .iter()
            .filter(|o| o.role == FlightRole::Leader)
            .count();
        assert_eq!(leaders, 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_fans_out_to_followers() {
        let flight: Arc<SingleFlight<Result<u32, Arc<String>>>> = Arc::new(SingleFlight::new());

        let leader_flight = Arc::clone(&flight);
        let leader = tokio::spawn(async move {
            leader_flight
                .execute("k", || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(Arc::new("boom".to_string()))
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower_flight = Arc::clone(&flight);
        let follower =
            tokio::spawn(async move { follower_flight.execute("k", || async { Ok(1) }).await });

        let leader_outcome = leader.await.unwrap();
        let follower_outcome = follower.await.unwrap();

        assert!(leader_outcome.value.is_err());
        // O seguidor recebe a falha do líder em vez de computar
        assert!(follower_outcome.value.is_err());
        assert_eq!(follower_outcome.role, FlightRole::Follower);
    }

    #[tokio::test]
    async fn test_independent_keys_run_in_parallel() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());

        let a_flight = Arc::clone(&flight);
        let a = tokio::spawn(async move {
            a_flight
                .execute("a", || async {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    1
                })
                .await
        });
        let b_flight = Arc::clone(&flight);
        let b = tokio::spawn(async move {
            b_flight
                .execute("b", || async {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    2
                })
                .await
        });

        let start = std::time::Instant::now();
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let elapsed = start.elapsed();

        assert_eq!(a.value, 1);
        assert_eq!(b.value, 2);
        assert_eq!(a.role, FlightRole::Leader);
        assert_eq!(b.role, FlightRole::Leader);
        // Paralelo, não serializado
        assert!(elapsed < Duration::from_millis(160));
    }

    #[tokio::test]
    async fn test_marker_cleared_after_completion() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        flight.execute("k", || async { 1 }).await;

        assert_eq!(flight.in_flight(), 0);
        // Próxima execução recomputa normalmente
        let outcome = flight.execute("k", || async { 2 }).await;
        assert_eq!(outcome.value, 2);
        assert_eq!(outcome.role, FlightRole::Leader);
    }

    #[tokio::test]
    async fn test_marker_cleared_when_leader_cancelled() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());

        let leader_flight = Arc::clone(&flight);
        let leader = tokio::spawn(async move {
            leader_flight
                .execute("k", || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    1
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(flight.in_flight(), 1);

        leader.abort();
        let _ = leader.await;

        // O guard limpou o marcador; a chave não fica presa
        assert_eq!(flight.in_flight(), 0);
        let outcome = flight.execute("k", || async { 5 }).await;
        assert_eq!(outcome.value, 5);
    }

    #[tokio::test]
    async fn test_follower_survives_leader_cancellation() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());

        let leader_flight = Arc::clone(&flight);
        let leader = tokio::spawn(async move {
            leader_flight
                .execute("k", || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    1
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower_flight = Arc::clone(&flight);
        let follower = tokio::spawn(async move {
            follower_flight.execute("k", || async { 99 }).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        let _ = leader.await;

        // O seguidor vira líder e computa por conta própria
        let outcome = follower.await.unwrap();
        assert_eq!(outcome.value, 99);
        assert_eq!(outcome.role, FlightRole::Leader);
    }

    #[tokio::test]
    async fn test_follower_timeout_does_not_affect_leader() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());

        let leader_flight = Arc::clone(&flight);
        let leader = tokio::spawn(async move {
            leader_flight
                .execute("k", || async {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    9
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower_flight = Arc::clone(&flight);
        let follower = tokio::time::timeout(
            Duration::from_millis(20),
            follower_flight.execute("k", || async { 0 }),
        )
        .await;

        // Seguidor desistiu por timeout; o líder completa normalmente
        assert!(follower.is_err());
        let leader_outcome = leader.await.unwrap();
        assert_eq!(leader_outcome.value, 9);
        assert_eq!(flight.in_flight(), 0);
    }
}
