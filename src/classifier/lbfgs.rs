use std::collections::VecDeque;

use ndarray::Array1;

use super::utils::max_abs;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 50;
const FTOL: f64 = 64.0 * f64::EPSILON;

#[derive(Debug, Clone, Copy)]
pub(crate) struct LbfgsOptions {
    pub max_iter: usize,
    /// Stop once the largest gradient component is at most this
    pub tol: f64,
    /// Number of correction pairs kept for the inverse Hessian estimate
    pub history: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct LbfgsResult {
    pub x: Array1<f64>,
    pub value: f64,
    pub n_iter: usize,
    pub converged: bool,
}

/// Minimizes a smooth function with limited-memory BFGS and a backtracking
/// Armijo line search.
///
/// `objective` returns the value and the gradient at a point. When the
/// iteration cap is hit, the last accepted iterate is returned with
/// `converged == false`.
pub(crate) fn minimize<F>(mut objective: F, x0: Array1<f64>, options: &LbfgsOptions) -> LbfgsResult
where
    F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
{
    let mut x = x0;
    let (mut fx, mut grad) = objective(&x);
    let mut history: VecDeque<(Array1<f64>, Array1<f64>, f64)> = VecDeque::with_capacity(options.history);

    if max_abs(&grad) <= options.tol {
        return LbfgsResult { x, value: fx, n_iter: 0, converged: true };
    }

    for iter in 1..=options.max_iter {
        let mut direction = two_loop(&grad, &history);
        let mut slope = grad.dot(&direction);
        if slope >= 0.0 {
            // curvature estimate went bad; restart from steepest descent
            history.clear();
            direction = -&grad;
            slope = grad.dot(&direction);
        }

        let mut step = if history.is_empty() {
            1.0 / grad.dot(&grad).sqrt().max(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = &x + &(&direction * step);
            let (f_new, g_new) = objective(&candidate);
            if f_new.is_finite() && f_new <= fx + ARMIJO * step * slope {
                accepted = Some((candidate, f_new, g_new));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new, g_new)) = accepted else {
            return LbfgsResult { x, value: fx, n_iter: iter, converged: false };
        };

        let s = &x_new - &x;
        let y = &g_new - &grad;
        let sy = s.dot(&y);
        if sy > 1e-10 {
            if history.len() == options.history {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let decrease = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        fx = f_new;
        grad = g_new;

        if max_abs(&grad) <= options.tol || decrease <= FTOL {
            return LbfgsResult { x, value: fx, n_iter: iter, converged: true };
        }
    }

    LbfgsResult { x, value: fx, n_iter: options.max_iter, converged: false }
}

/// Two-loop recursion: approximates `-H * grad` from the stored corrections.
fn two_loop(grad: &Array1<f64>, history: &VecDeque<(Array1<f64>, Array1<f64>, f64)>) -> Array1<f64> {
    let mut q = grad.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for (s, y, rho) in history.iter().rev() {
        let alpha = rho * s.dot(&q);
        q.scaled_add(-alpha, y);
        alphas.push(alpha);
    }

    if let Some((s, y, _)) = history.back() {
        let yy = y.dot(y);
        if yy > 0.0 {
            q *= s.dot(y) / yy;
        }
    }

    for ((s, y, rho), alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = rho * y.dot(&q);
        q.scaled_add(alpha - beta, s);
    }

    -q
}
