//! Streaming STFT framer: input/output FIFOs, overlap-add, and the
//! analysis/synthesis window pair. Fires the frame callback once every
//! `hop` input samples.

use crate::fft::FftBackend;
use crate::window::WindowPair;

pub struct StftProcessor {
    fft_size: usize,
    hop: usize,
    input_latency: usize,
    overlap_factor: usize,
    window: WindowPair,

    in_fifo: Vec<f32>,
    out_fifo: Vec<f32>,
    output_accum: Vec<f32>,
    read_position: usize,

    scratch_real: Vec<f32>,
    scratch_halfcomplex: Vec<f32>,

    fft: Box<dyn FftBackend>,
}

impl StftProcessor {
    pub fn new(fft_size: usize, overlap_factor: usize, window: WindowPair, fft: Box<dyn FftBackend>) -> Self {
        let hop = fft_size / overlap_factor;
        let input_latency = fft_size - hop;
        Self {
            fft_size,
            hop,
            input_latency,
            overlap_factor,
            window,
            in_fifo: vec![0.0; fft_size],
            out_fifo: vec![0.0; fft_size],
            output_accum: vec![0.0; fft_size * 2],
            read_position: input_latency,
            scratch_real: vec![0.0; fft_size],
            scratch_halfcomplex: vec![0.0; fft_size],
            fft,
        }
    }

    /// Reported latency: `fft_size - hop`, matching the original plugin's
    /// own `stft_processor_get_latency`. See DESIGN.md — the bit-exact
    /// reconstruction delay of this overlap-add scheme is actually one
    /// full frame (`fft_size`), a full hop later than this value; that
    /// discrepancy is carried over from the source unchanged rather than
    /// silently corrected.
    pub fn latency(&self) -> usize {
        self.input_latency
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn reset(&mut self) {
        self.in_fifo.iter_mut().for_each(|v| *v = 0.0);
        self.out_fifo.iter_mut().for_each(|v| *v = 0.0);
        self.output_accum.iter_mut().for_each(|v| *v = 0.0);
        self.scratch_real.iter_mut().for_each(|v| *v = 0.0);
        self.scratch_halfcomplex.iter_mut().for_each(|v| *v = 0.0);
        self.read_position = self.input_latency;
    }

    /// Drives `n_samples` of `input` through the FIFO, invoking `frame_fn`
    /// on the halfcomplex buffer once per completed frame (it may mutate
    /// the buffer in place but must not resize it), and writes the
    /// corresponding delayed output samples into `output`.
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        n_samples: usize,
        frame_fn: &mut dyn FnMut(&mut [f32]),
    ) {
        for i in 0..n_samples {
            self.in_fifo[self.read_position] = input[i];
            output[i] = self.out_fifo[self.read_position - self.input_latency];
            self.read_position += 1;

            if self.read_position >= self.fft_size {
                self.read_position = self.input_latency;
                self.run_frame(frame_fn);
            }
        }
    }

    fn run_frame(&mut self, frame_fn: &mut dyn FnMut(&mut [f32])) {
        for (s, (x, w)) in self
            .scratch_real
            .iter_mut()
            .zip(self.in_fifo.iter().zip(&self.window.analysis))
        {
            *s = x * w;
        }
        self.fft.forward(&self.scratch_real, &mut self.scratch_halfcomplex);

        frame_fn(&mut self.scratch_halfcomplex);

        self.fft.inverse(&self.scratch_halfcomplex, &mut self.scratch_real);

        let norm = 1.0 / (self.window.overlap_scale * self.overlap_factor as f32);
        for (s, w) in self.scratch_real.iter_mut().zip(&self.window.synthesis) {
            *s = (*s / self.fft_size as f32) * w * norm;
        }

        for (acc, s) in self.output_accum.iter_mut().zip(&self.scratch_real) {
            *acc += s;
        }

        self.out_fifo[..self.hop].copy_from_slice(&self.output_accum[..self.hop]);
        self.output_accum.copy_within(self.hop..self.hop + self.fft_size, 0);
        self.in_fifo.copy_within(self.hop.., 0);
    }
}
