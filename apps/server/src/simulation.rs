use std::f64::consts::PI;
use std::sync::Arc;

use crac_fuzzy::FuzzyEngine;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schedule::{load_noise, load_offset};

pub const SIMULATION_MINUTES: u32 = 1440;
pub const STEP_MINUTES: u32 = 5;

// Comfort band and critical limits of the room temperature (°C)
const BAND_LOW: f64 = 20.0;
const BAND_HIGH: f64 = 24.0;
const CRITICAL_LOW: f64 = 18.0;
const CRITICAL_HIGH: f64 = 26.0;
const POWER_WARNING: f64 = 95.0;

/// First-order room model:
/// T[n+1] = a*T[n] + b*P + c*Q + d*Text + e
#[derive(Debug, Clone, Copy)]
pub struct PlantModel {
    inertia: f64,
    crac_gain: f64,
    load_gain: f64,
    external_gain: f64,
    offset: f64,
}

impl Default for PlantModel {
    fn default() -> Self {
        PlantModel {
            inertia: 0.9,
            crac_gain: -0.08,
            load_gain: 0.05,
            external_gain: 0.02,
            offset: 3.5,
        }
    }
}

impl PlantModel {
    pub fn next_temperature(&self, current: f64, power: f64, load: f64, external: f64) -> f64 {
        self.inertia * current
            + self.crac_gain * power
            + self.load_gain * load
            + self.external_gain * external
            + self.offset
    }
}

fn default_initial_temperature() -> f64 {
    22.0
}

fn default_external_base() -> f64 {
    25.0
}

fn default_load_base() -> f64 {
    40.0
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimulationParams {
    #[serde(rename = "temp_inicial", default = "default_initial_temperature")]
    pub initial_temperature: f64,
    #[serde(rename = "temp_externa_base", default = "default_external_base")]
    pub external_base: f64,
    #[serde(rename = "carga_base", default = "default_load_base")]
    pub load_base: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            initial_temperature: default_initial_temperature(),
            external_base: default_external_base(),
            load_base: default_load_base(),
        }
    }
}

/// Sampled series of one simulated day, one entry per step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationResults {
    pub time: Vec<u32>,
    pub temperature: Vec<f64>,
    pub power_crac: Vec<f64>,
    pub temp_externa: Vec<f64>,
    pub carga_termica: Vec<f64>,
    pub erro: Vec<f64>,
    pub setpoint: Vec<f64>,
}

impl SimulationResults {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationMetrics {
    pub rmse: f64,
    pub percent_in_range: f64,
    pub violations: usize,
    pub energy_consumption: f64,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: i64,
}

pub fn check_alerts(temperature: f64, power: f64, timestamp: i64) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if temperature < CRITICAL_LOW {
        alerts.push(Alert {
            level: AlertLevel::Critical,
            message: format!("critical low temperature: {:.1}°C", temperature),
            timestamp,
        });
    } else if temperature > CRITICAL_HIGH {
        alerts.push(Alert {
            level: AlertLevel::Critical,
            message: format!("critical high temperature: {:.1}°C", temperature),
            timestamp,
        });
    }
    if power > POWER_WARNING {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            message: format!("CRAC power very high: {:.1}%", power),
            timestamp,
        });
    }
    alerts
}

/// Closed loop of the fuzzy controller and the plant model over one day.
pub struct Simulation {
    engine: Arc<FuzzyEngine>,
    plant: PlantModel,
    setpoint: f64,
}

impl Simulation {
    pub fn new(engine: Arc<FuzzyEngine>, setpoint: f64) -> Self {
        Simulation {
            engine,
            plant: PlantModel::default(),
            setpoint,
        }
    }

    /// Runs 24 hours at `STEP_MINUTES` resolution. `progress` receives the
    /// completed percentage roughly every tenth of the run.
    pub fn run<R: Rng>(
        &self,
        params: SimulationParams,
        rng: &mut R,
        mut progress: impl FnMut(f64),
    ) -> SimulationResults {
        let steps = SIMULATION_MINUTES / STEP_MINUTES;
        let report_every = steps / 10 + 1;
        let mut results = SimulationResults::default();

        let mut temperature = params.initial_temperature;
        let mut previous_error = 0.0;

        info!("simulating {} minutes in {} steps", SIMULATION_MINUTES, steps + 1);

        for i in 0..=steps {
            let t = (i * STEP_MINUTES).min(SIMULATION_MINUTES);
            let hour = t as f64 / 60.0;
            if i % report_every == 0 {
                progress(t as f64 / SIMULATION_MINUTES as f64 * 100.0);
            }

            let noise: f64 = rng.sample(StandardNormal);
            let external = (params.external_base
                + 5.0 * (2.0 * PI * t as f64 / SIMULATION_MINUTES as f64).sin()
                + 0.5 * noise)
                .clamp(10.0, 35.0);

            let noise: f64 = rng.sample(StandardNormal);
            let load = (params.load_base + load_offset(hour) + load_noise(hour) * noise)
                .clamp(0.0, 100.0);

            let error = temperature - self.setpoint;
            let error_rate = error - previous_error;
            let power = self.engine.calculate(error, error_rate, external, load);

            temperature = self.plant.next_temperature(temperature, power, load, external);

            results.time.push(t);
            results.temperature.push(temperature);
            results.power_crac.push(power);
            results.temp_externa.push(external);
            results.carga_termica.push(load);
            results.erro.push(error);
            results.setpoint.push(self.setpoint);

            previous_error = error;
        }

        progress(100.0);
        info!("simulation complete");
        results
    }
}

pub fn metrics(results: &SimulationResults) -> SimulationMetrics {
    let n = results.len().max(1) as f64;
    let temps = &results.temperature;

    let rmse = (results.erro.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
    let in_range = temps
        .iter()
        .filter(|t| (BAND_LOW..=BAND_HIGH).contains(*t))
        .count();
    let violations = temps
        .iter()
        .filter(|t| **t < CRITICAL_LOW || **t > CRITICAL_HIGH)
        .count();

    SimulationMetrics {
        rmse,
        percent_in_range: in_range as f64 / n * 100.0,
        violations,
        energy_consumption: results.power_crac.iter().sum(),
        avg_temp: temps.iter().sum::<f64>() / n,
        max_temp: temps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min_temp: temps.iter().copied().fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn simulation() -> Simulation {
        Simulation::new(Arc::new(FuzzyEngine::new().unwrap()), 22.0)
    }

    #[test]
    fn plant_equilibrium() {
        let plant = PlantModel::default();
        // 0.1 * 22 = -0.08 * 47.5 + 0.05 * 40 + 0.02 * 25 + 3.5
        let next = plant.next_temperature(22.0, 47.5, 40.0, 25.0);
        assert!((next - 22.0).abs() < 1e-9);
    }

    #[test]
    fn one_day_run() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut reported = Vec::new();
        let results = simulation().run(SimulationParams::default(), &mut rng, |p| reported.push(p));

        assert_eq!(results.len(), 289);
        assert_eq!(results.time[0], 0);
        assert_eq!(*results.time.last().unwrap(), 1440);
        assert!(results.power_crac.iter().all(|p| (0.0..=100.0).contains(p)));
        assert!(results.temp_externa.iter().all(|t| (10.0..=35.0).contains(t)));
        assert!(results.carga_termica.iter().all(|q| (0.0..=100.0).contains(q)));
        assert!(results.temperature.iter().all(|t| t.is_finite()));
        assert_eq!(results.erro[0], 0.0);

        assert_eq!(reported.first(), Some(&0.0));
        assert_eq!(reported.last(), Some(&100.0));
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn same_seed_same_day() {
        let sim = simulation();
        let a = sim.run(SimulationParams::default(), &mut StdRng::seed_from_u64(3), |_| {});
        let b = sim.run(SimulationParams::default(), &mut StdRng::seed_from_u64(3), |_| {});
        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.power_crac, b.power_crac);
    }

    #[test]
    fn metrics_are_consistent() {
        let results = SimulationResults {
            time: vec![0, 5, 10, 15],
            temperature: vec![17.0, 21.0, 23.0, 27.0],
            power_crac: vec![10.0, 20.0, 30.0, 40.0],
            temp_externa: vec![25.0; 4],
            carga_termica: vec![40.0; 4],
            erro: vec![1.0, -1.0, 1.0, -1.0],
            setpoint: vec![22.0; 4],
        };
        let m = metrics(&results);
        assert_eq!(m.rmse, 1.0);
        assert_eq!(m.percent_in_range, 50.0);
        assert_eq!(m.violations, 2);
        assert_eq!(m.energy_consumption, 100.0);
        assert_eq!(m.avg_temp, 22.0);
        assert_eq!(m.max_temp, 27.0);
        assert_eq!(m.min_temp, 17.0);
    }

    #[test]
    fn alerts_on_limits() {
        assert!(check_alerts(22.0, 50.0, 0).is_empty());
        let alerts = check_alerts(17.5, 96.0, 42);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[1].level, AlertLevel::Warning);
        assert_eq!(alerts[1].timestamp, 42);
        assert_eq!(check_alerts(26.5, 10.0, 0)[0].level, AlertLevel::Critical);
    }
}
