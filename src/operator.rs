use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::scan::submission::{Fitness, SleepHours};
use crate::scan::{AttendanceForm, Operator, ScanResult};

/// Kiosk operator answering prompts on the terminal.
pub struct StdinOperator {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinOperator {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn prompt(&mut self, question: &str) -> Option<String> {
        println!("{question}");
        self.lines.next_line().await.ok().flatten()
    }
}

impl Default for StdinOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operator for StdinOperator {
    async fn fill_form(&mut self, result: &ScanResult) -> Option<AttendanceForm> {
        println!("{} [{}] {}", result.employee_id, result.name, result.display_time);
        if let Some(warning) = &result.warning {
            println!("! {warning}");
        }

        let hours: Vec<&str> = SleepHours::ALL.iter().map(|h| h.as_str()).collect();
        let jam_tidur = self
            .prompt(&format!("Jam tidur ({}), kosong untuk batal:", hours.join("/")))
            .await?;
        if jam_tidur.trim().is_empty() {
            return None;
        }

        let fitness: Vec<&str> = Fitness::ALL.iter().map(|f| f.as_str()).collect();
        let fit_to_work = self.prompt(&format!("Kondisi ({}):", fitness.join("/"))).await?;

        Some(AttendanceForm::new(jam_tidur, fit_to_work))
    }

    async fn wait_for_restart(&mut self) -> bool {
        match self.prompt("Tekan Enter untuk mulai scan, atau ketik q untuk keluar:").await {
            Some(line) => !line.trim().eq_ignore_ascii_case("q"),
            None => false,
        }
    }
}
