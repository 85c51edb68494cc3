use std::error::Error;
use std::io::{self, Write};

use risk_domain::EventRequest;
use risk_governance::{ModelApprovals, ModelRecord, ModelRegistry, PromptApprovals, PromptRecord, PromptRegistry};
use risk_orchestrator::{AppContext, OrchestratorError};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Pequeño menú interactivo sobre el orquestador.
///
/// El almacenamiento se elige con `RISKFLOW_DB_URL` / `DATABASE_URL`; sin
/// ninguna de las dos todo vive en memoria mientras dure el proceso.
///
/// Opciones soportadas:
/// 1) Registrar y aprobar los modelos y prompts por defecto
/// 2) Enviar evento
/// 3) Consultar evento
/// 4) Reanudar evento en curso
/// 5) Estado de salud
/// 6) Salir
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // `RUST_LOG` controla el nivel; los registros de `log` se reenvían.
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let ctx = AppContext::from_env()?;
    let orchestrator = ctx.orchestrator();
    let health = ctx.health_check();

    loop {
        println!("\n== riskflow ==");
        println!("1) Registrar y aprobar activos por defecto");
        println!("2) Enviar evento");
        println!("3) Consultar evento");
        println!("4) Reanudar evento");
        println!("5) Salud");
        println!("6) Salir");

        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" => match seed_assets(&ctx).await {
                Ok(()) => println!("Activos aprobados en v1"),
                Err(e) => eprintln!("Error registrando activos: {}", e),
            },
            "2" => {
                let tenant = prompt("Tenant: ")?;
                let event_type = prompt("Tipo (risk/compliance): ")?;
                let payload_s = prompt("Payload (JSON): ")?;
                let payload = match serde_json::from_str(&payload_s) {
                    Ok(v) => v,
                    Err(e) => { eprintln!("Payload inválido: {}", e); continue; }
                };
                let key = prompt("Idempotency key (enter para generar): ")?;
                let key = if key.trim().is_empty() { Uuid::new_v4().to_string() } else { key.trim().to_string() };
                let request = EventRequest::new(event_type.trim(), payload, "v1");
                match orchestrator.create_event(&request, &key, tenant.trim(), "").await {
                    Ok(resp) => println!("{}", serde_json::to_string_pretty(&resp)?),
                    Err(e) => report(&e),
                }
            }
            "3" | "4" => {
                let tenant = prompt("Tenant: ")?;
                let id_s = prompt("Event id (UUID): ")?;
                let id = match Uuid::parse_str(id_s.trim()) {
                    Ok(u) => u,
                    Err(_) => { eprintln!("UUID inválido"); continue; }
                };
                if choice.trim() == "3" {
                    match orchestrator.get_event(tenant.trim(), &id).await {
                        Ok(ev) => println!("{}", serde_json::to_string_pretty(&ev)?),
                        Err(e) => report(&e),
                    }
                } else {
                    match orchestrator.resume_event(tenant.trim(), &id).await {
                        Ok(resp) => println!("{}", serde_json::to_string_pretty(&resp)?),
                        Err(e) => report(&e),
                    }
                }
            }
            "5" => {
                let status = health.check().await;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            "6" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

/// Registra `v1` de los cuatro activos si faltan y los aprueba.
async fn seed_assets(ctx: &AppContext) -> Result<(), Box<dyn Error>> {
    for name in ["risk-model", "compliance-model"] {
        if ctx.models.get(name, "v1").await?.is_none() {
            ctx.model_approvals.register(ModelRecord::new(name, "v1", name.as_bytes())).await?;
        }
        ctx.model_approvals.approve(name, "v1", "cli").await?;
    }
    for id in ["risk-prompt", "compliance-prompt"] {
        if ctx.prompts.get(id, "v1").await?.is_none() {
            ctx.prompt_approvals.register(PromptRecord::new(id, "v1", "Evalua {payload}")).await?;
        }
        ctx.prompt_approvals.approve(id, "v1", "cli").await?;
    }
    Ok(())
}

fn report(e: &OrchestratorError) {
    eprintln!("Error [{}] reintentable={}: {}", e.kind(), e.is_retriable(), e);
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
