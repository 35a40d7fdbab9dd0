//! Debug TCP endpoint: a raw SQL console for operators.
//!
//! One request per connection — read whatever bytes arrive, treat them as a
//! single SQL statement, run it through [`Dao::run`], write back
//! pipe-separated rows (or the error text), then close.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::core::Ballcone;

pub async fn run(addr: SocketAddr, ballcone: Arc<Ballcone>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "debug TCP listener bound");

    loop {
        let (socket, peer) = listener.accept().await?;
        let ballcone = Arc::clone(&ballcone);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, &ballcone).await {
                tracing::debug!(%peer, error = %e, "debug connection failed");
            }
        });
    }
}

async fn handle_connection(mut socket: tokio::net::TcpStream, ballcone: &Ballcone) -> std::io::Result<()> {
    let mut buf = Vec::new();
    socket.read_to_end(&mut buf).await?;

    let Ok(sql) = String::from_utf8(buf) else {
        return Ok(());
    };
    let sql = sql.trim();
    if sql.is_empty() {
        return Ok(());
    }

    let response = match ballcone.dao().run(sql).await {
        Ok((_, rows)) => render_rows(&rows),
        Err(e) => e.to_string(),
    };

    socket.write_all(response.as_bytes()).await
}

fn render_rows(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join("|"));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_rows_pipe_separates_columns() {
        let rows = vec![vec!["a".to_string(), "1".to_string()], vec!["b".to_string(), "2".to_string()]];
        assert_eq!(render_rows(&rows), "a|1\nb|2\n");
    }

    #[test]
    fn render_rows_of_no_rows_is_empty() {
        assert_eq!(render_rows(&[]), "");
    }
}
