//! Mixed-radix real FFT (FFTPACK lineage)
//!
//! Real-input transforms for arbitrary lengths, decomposed over the factors
//! {4, 2, 3, 5} with a general-radix pass for anything else. Descends from
//! Paul N. Swarztrauber's public-domain FFTPACK; the factor preference order
//! and the move-all-2s-to-the-end rewrite of the factor list are kept
//! exactly, since the twiddle layout depends on them.
//!
//! The forward pass leaves data in FFTPACK's half-complex packing
//! `[DC, re1, im1, re2, im2, ..., Nyquist]` (Nyquist only for even N);
//! `rfft`/`irfft` convert to and from the standard `N/2+1` complex layout.
//! The backward pass applies no 1/N scaling; callers normalise.

use bp_core::{Complex32, Sample};
use std::f64::consts::PI;

/// Precomputed factorization, twiddles, and scratch for one transform size.
#[derive(Debug, Clone)]
pub struct Fftpack {
    n: usize,
    wa: Vec<Sample>,
    ifac: [i32; 15],
    work: Vec<Sample>,
    scratch: Vec<Sample>,
}

impl Fftpack {
    pub fn new(n: usize) -> Self {
        debug_assert!(n > 0);
        let mut ctx = Self {
            n,
            wa: vec![0.0; n],
            ifac: [0; 15],
            work: vec![0.0; n],
            scratch: vec![0.0; n],
        };
        if n > 1 {
            drfti1(n, &mut ctx.wa, &mut ctx.ifac);
        }
        ctx
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn half_size(&self) -> usize {
        self.n / 2 + 1
    }

    /// Forward real FFT into the standard `N/2+1` complex half spectrum.
    pub fn rfft(&mut self, input: &[Sample], output: &mut [Complex32]) {
        let n = self.n;
        debug_assert_eq!(input.len(), n);
        debug_assert!(output.len() >= self.half_size());

        if n == 1 {
            output[0] = Complex32::new(input[0], 0.0);
            return;
        }

        self.work.copy_from_slice(input);
        drftf1(
            n,
            &mut self.work,
            &mut self.scratch,
            &self.wa,
            &self.ifac,
        );

        // Unpack half-complex: [DC, re1, im1, ..., (Nyquist)]
        output[0] = Complex32::new(self.work[0], 0.0);
        if n % 2 == 0 {
            for i in 1..n / 2 {
                output[i] = Complex32::new(self.work[2 * i - 1], self.work[2 * i]);
            }
            output[n / 2] = Complex32::new(self.work[n - 1], 0.0);
        } else {
            for i in 1..self.half_size() {
                output[i] = Complex32::new(self.work[2 * i - 1], self.work[2 * i]);
            }
        }
    }

    /// Inverse real FFT from the standard half spectrum. Unnormalised: the
    /// output is `N` times the time-domain signal.
    pub fn irfft(&mut self, input: &[Complex32], output: &mut [Sample]) {
        let n = self.n;
        debug_assert!(input.len() >= self.half_size());
        debug_assert_eq!(output.len(), n);

        if n == 1 {
            output[0] = input[0].re;
            return;
        }

        // Pack into half-complex layout
        self.work[0] = input[0].re;
        if n % 2 == 0 {
            for i in 1..n / 2 {
                self.work[2 * i - 1] = input[i].re;
                self.work[2 * i] = input[i].im;
            }
            self.work[n - 1] = input[n / 2].re;
        } else {
            for i in 1..self.half_size() {
                self.work[2 * i - 1] = input[i].re;
                self.work[2 * i] = input[i].im;
            }
        }

        drftb1(
            n,
            &mut self.work,
            &mut self.scratch,
            &self.wa,
            &self.ifac,
        );
        output.copy_from_slice(&self.work);
    }
}

// ---------- Initialisation ----------

/// Factor `n` over {4, 2, 3, 5} (then odd candidates), move any factor-2 to
/// the front of the list when it is not first, and fill the twiddle table.
fn drfti1(n: usize, wa: &mut [Sample], ifac: &mut [i32; 15]) {
    const NTRYH: [usize; 4] = [4, 2, 3, 5];

    let mut nf = 0usize;
    let mut nl = n;
    let mut j = 0usize;
    let mut ntry = 0usize;

    'factor: loop {
        ntry = if j < 4 { NTRYH[j] } else { ntry + 2 };
        j += 1;

        while nl % ntry == 0 {
            nf += 1;
            ifac[nf + 1] = ntry as i32;
            nl /= ntry;

            if ntry == 2 && nf != 1 {
                for i in 1..nf {
                    let ib = nf - i + 1;
                    ifac[ib + 1] = ifac[ib];
                }
                ifac[2] = 2;
            }

            if nl == 1 {
                break 'factor;
            }
        }
    }

    ifac[0] = n as i32;
    ifac[1] = nf as i32;

    let argh = 2.0 * PI / n as f64;
    let mut is = 0usize;
    let nfm1 = nf - 1;
    let mut l1 = 1usize;

    if nfm1 == 0 {
        return;
    }

    for k1 in 0..nfm1 {
        let ip = ifac[k1 + 2] as usize;
        let mut ld = 0usize;
        let l2 = l1 * ip;
        let ido = n / l2;

        for _ in 0..ip - 1 {
            ld += l1;
            let mut i = is;
            let argld = ld as f64 * argh;
            let mut fi = 0.0f64;

            let mut ii = 2;
            while ii < ido {
                fi += 1.0;
                let arg = fi * argld;
                wa[i] = arg.cos() as Sample;
                wa[i + 1] = arg.sin() as Sample;
                i += 2;
                ii += 2;
            }
            is += ido;
        }
        l1 = l2;
    }
}

// ---------- Pass drivers ----------

fn drftf1(n: usize, c: &mut [Sample], ch: &mut [Sample], wa: &[Sample], ifac: &[i32; 15]) {
    let nf = ifac[1] as usize;
    let mut na = 1usize;
    let mut l2 = n;
    let mut iw = n;

    for k1 in 0..nf {
        let kh = nf - k1;
        let ip = ifac[kh + 1] as usize;
        let l1 = l2 / ip;
        let ido = n / l2;
        let idl1 = ido * l1;
        iw -= (ip - 1) * ido;
        na = 1 - na;

        if ip == 4 {
            let ix2 = iw + ido;
            let ix3 = ix2 + ido;
            if na != 0 {
                radf4(ido, l1, ch, c, &wa[iw - 1..], &wa[ix2 - 1..], &wa[ix3 - 1..]);
            } else {
                radf4(ido, l1, c, ch, &wa[iw - 1..], &wa[ix2 - 1..], &wa[ix3 - 1..]);
            }
        } else if ip == 2 {
            if na != 0 {
                radf2(ido, l1, ch, c, &wa[iw - 1..]);
            } else {
                radf2(ido, l1, c, ch, &wa[iw - 1..]);
            }
        } else {
            if ido == 1 {
                na = 1 - na;
            }
            if na != 0 {
                radfg(ido, ip, l1, idl1, ch, c, &wa[iw - 1..]);
                na = 1;
            } else {
                radfg(ido, ip, l1, idl1, c, ch, &wa[iw - 1..]);
                na = 0;
            }
        }

        l2 = l1;
    }

    if na == 1 {
        return;
    }
    c[..n].copy_from_slice(&ch[..n]);
}

fn drftb1(n: usize, c: &mut [Sample], ch: &mut [Sample], wa: &[Sample], ifac: &[i32; 15]) {
    let nf = ifac[1] as usize;
    let mut na = 0usize;
    let mut l1 = 1usize;
    let mut iw = 1usize;

    for k1 in 0..nf {
        let ip = ifac[k1 + 2] as usize;
        let l2 = ip * l1;
        let ido = n / l2;
        let idl1 = ido * l1;

        if ip == 4 {
            let ix2 = iw + ido;
            let ix3 = ix2 + ido;
            if na != 0 {
                radb4(ido, l1, ch, c, &wa[iw - 1..], &wa[ix2 - 1..], &wa[ix3 - 1..]);
            } else {
                radb4(ido, l1, c, ch, &wa[iw - 1..], &wa[ix2 - 1..], &wa[ix3 - 1..]);
            }
            na = 1 - na;
        } else if ip == 2 {
            if na != 0 {
                radb2(ido, l1, ch, c, &wa[iw - 1..]);
            } else {
                radb2(ido, l1, c, ch, &wa[iw - 1..]);
            }
            na = 1 - na;
        } else if ip == 3 {
            let ix2 = iw + ido;
            if na != 0 {
                radb3(ido, l1, ch, c, &wa[iw - 1..], &wa[ix2 - 1..]);
            } else {
                radb3(ido, l1, c, ch, &wa[iw - 1..], &wa[ix2 - 1..]);
            }
            na = 1 - na;
        } else {
            if na != 0 {
                radbg(ido, ip, l1, idl1, ch, c, &wa[iw - 1..]);
            } else {
                radbg(ido, ip, l1, idl1, c, ch, &wa[iw - 1..]);
            }
            if ido == 1 {
                na = 1 - na;
            }
        }

        l1 = l2;
        iw += (ip - 1) * ido;
    }

    if na == 0 {
        return;
    }
    c[..n].copy_from_slice(&ch[..n]);
}

// ---------- Radix-2 ----------

fn radf2(ido: usize, l1: usize, cc: &[Sample], ch: &mut [Sample], wa1: &[Sample]) {
    let t0 = l1 * ido;
    let mut t1 = 0usize;
    let mut t2 = t0;
    let t3 = ido << 1;

    for _ in 0..l1 {
        ch[t1 << 1] = cc[t1] + cc[t2];
        ch[(t1 << 1) + t3 - 1] = cc[t1] - cc[t2];
        t1 += ido;
        t2 += ido;
    }

    if ido < 2 {
        return;
    }

    if ido > 2 {
        t1 = 0;
        t2 = t0;
        for _ in 0..l1 {
            let mut t3 = t2;
            let mut t4 = (t1 << 1) + (ido << 1);
            let mut t5 = t1;
            let mut t6 = t1 + t1;

            let mut i = 2;
            while i < ido {
                t3 += 2;
                t4 -= 2;
                t5 += 2;
                t6 += 2;
                let tr2 = wa1[i - 2] * cc[t3 - 1] + wa1[i - 1] * cc[t3];
                let ti2 = wa1[i - 2] * cc[t3] - wa1[i - 1] * cc[t3 - 1];
                ch[t6] = cc[t5] + ti2;
                ch[t4] = ti2 - cc[t5];
                ch[t6 - 1] = cc[t5 - 1] + tr2;
                ch[t4 - 1] = cc[t5 - 1] - tr2;
                i += 2;
            }
            t1 += ido;
            t2 += ido;
        }

        if ido % 2 == 1 {
            return;
        }
    }

    let mut t1 = ido;
    let mut t2 = ido - 1 + t0;
    let mut t3 = ido - 1;
    for _ in 0..l1 {
        ch[t1] = -cc[t2];
        ch[t1 - 1] = cc[t3];
        t1 += ido << 1;
        t2 += ido;
        t3 += ido;
    }
}

fn radb2(ido: usize, l1: usize, cc: &[Sample], ch: &mut [Sample], wa1: &[Sample]) {
    let t0 = l1 * ido;
    let mut t1 = 0usize;
    let mut t2 = 0usize;
    let t3 = (ido << 1) - 1;

    for _ in 0..l1 {
        ch[t1] = cc[t2] + cc[t3 + t2];
        ch[t1 + t0] = cc[t2] - cc[t3 + t2];
        t1 += ido;
        t2 = t1 << 1;
    }

    if ido < 2 {
        return;
    }

    if ido > 2 {
        t1 = 0;
        t2 = 0;
        for _ in 0..l1 {
            let mut t3 = t1;
            let mut t4 = t2;
            let mut t5 = t4 + (ido << 1);
            let mut t6 = t0 + t1;

            let mut i = 2;
            while i < ido {
                t3 += 2;
                t4 += 2;
                t5 -= 2;
                t6 += 2;
                ch[t3 - 1] = cc[t4 - 1] + cc[t5 - 1];
                let tr2 = cc[t4 - 1] - cc[t5 - 1];
                ch[t3] = cc[t4] - cc[t5];
                let ti2 = cc[t4] + cc[t5];
                ch[t6 - 1] = wa1[i - 2] * tr2 - wa1[i - 1] * ti2;
                ch[t6] = wa1[i - 2] * ti2 + wa1[i - 1] * tr2;
                i += 2;
            }
            t1 += ido;
            t2 = t1 << 1;
        }

        if ido % 2 == 1 {
            return;
        }
    }

    let mut t1 = ido - 1;
    let mut t2 = ido - 1;
    for _ in 0..l1 {
        ch[t1] = cc[t2] + cc[t2];
        ch[t1 + t0] = -(cc[t2 + 1] + cc[t2 + 1]);
        t1 += ido;
        t2 += ido << 1;
    }
}

// ---------- Radix-3 (backward only; forward radix-3 goes through radfg) ----------

fn radb3(ido: usize, l1: usize, cc: &[Sample], ch: &mut [Sample], wa1: &[Sample], wa2: &[Sample]) {
    const TAUR: Sample = -0.5;
    const TAUI: Sample = 0.866_025_4;
    let t0 = l1 * ido;

    let mut t1 = 0usize;
    let t2 = t0 << 1;
    let mut t3 = ido << 1;
    let t4 = ido + (ido << 1);
    let mut t5 = 0usize;

    for _ in 0..l1 {
        let tr2 = cc[t3 - 1] + cc[t3 - 1];
        let cr2 = cc[t5] + TAUR * tr2;
        ch[t1] = cc[t5] + tr2;
        let ci3 = TAUI * (cc[t3] + cc[t3]);
        ch[t1 + t0] = cr2 - ci3;
        ch[t1 + t2] = cr2 + ci3;
        t1 += ido;
        t3 += t4;
        t5 += t4;
    }

    if ido == 1 {
        return;
    }

    let mut t1 = 0usize;
    let t3 = ido << 1;
    for _ in 0..l1 {
        let mut t7 = t1 + (t1 << 1);
        let mut t5 = t7 + t3;
        let mut t6 = t5;
        let mut t8 = t1;
        let mut t9 = t1 + t0;
        let mut t10 = t9 + t0;

        let mut i = 2;
        while i < ido {
            t5 += 2;
            t6 -= 2;
            t7 += 2;
            t8 += 2;
            t9 += 2;
            t10 += 2;
            let tr2 = cc[t5 - 1] + cc[t6 - 1];
            let cr2 = cc[t7 - 1] + TAUR * tr2;
            ch[t8 - 1] = cc[t7 - 1] + tr2;
            let ti2 = cc[t5] - cc[t6];
            let ci2 = cc[t7] + TAUR * ti2;
            ch[t8] = cc[t7] + ti2;
            let cr3 = TAUI * (cc[t5 - 1] - cc[t6 - 1]);
            let ci3 = TAUI * (cc[t5] + cc[t6]);
            let dr2 = cr2 - ci3;
            let dr3 = cr2 + ci3;
            let di2 = ci2 + cr3;
            let di3 = ci2 - cr3;
            ch[t9 - 1] = wa1[i - 2] * dr2 - wa1[i - 1] * di2;
            ch[t9] = wa1[i - 2] * di2 + wa1[i - 1] * dr2;
            ch[t10 - 1] = wa2[i - 2] * dr3 - wa2[i - 1] * di3;
            ch[t10] = wa2[i - 2] * di3 + wa2[i - 1] * dr3;
            i += 2;
        }
        t1 += ido;
    }
}

// ---------- Radix-4 ----------

fn radf4(
    ido: usize,
    l1: usize,
    cc: &[Sample],
    ch: &mut [Sample],
    wa1: &[Sample],
    wa2: &[Sample],
    wa3: &[Sample],
) {
    const HSQT2: Sample = std::f32::consts::FRAC_1_SQRT_2;
    let t0 = l1 * ido;

    let mut t1 = t0;
    let mut t4 = t1 << 1;
    let mut t2 = t1 + (t1 << 1);
    let mut t3 = 0usize;

    for _ in 0..l1 {
        let tr1 = cc[t1] + cc[t2];
        let tr2 = cc[t3] + cc[t4];
        let mut t5 = t3 << 2;
        ch[t5] = tr1 + tr2;
        ch[(ido << 2) + t5 - 1] = tr2 - tr1;
        t5 += ido << 1;
        ch[t5 - 1] = cc[t3] - cc[t4];
        ch[t5] = cc[t2] - cc[t1];

        t1 += ido;
        t2 += ido;
        t3 += ido;
        t4 += ido;
    }

    if ido < 2 {
        return;
    }

    if ido > 2 {
        let mut t1 = 0usize;
        for _ in 0..l1 {
            let mut t2 = t1;
            let mut t4 = t1 << 2;
            let t6 = ido << 1;
            let mut t5 = t6 + t4;

            let mut i = 2;
            while i < ido {
                t2 += 2;
                let mut t3 = t2;
                t4 += 2;
                t5 -= 2;

                t3 += t0;
                let cr2 = wa1[i - 2] * cc[t3 - 1] + wa1[i - 1] * cc[t3];
                let ci2 = wa1[i - 2] * cc[t3] - wa1[i - 1] * cc[t3 - 1];
                t3 += t0;
                let cr3 = wa2[i - 2] * cc[t3 - 1] + wa2[i - 1] * cc[t3];
                let ci3 = wa2[i - 2] * cc[t3] - wa2[i - 1] * cc[t3 - 1];
                t3 += t0;
                let cr4 = wa3[i - 2] * cc[t3 - 1] + wa3[i - 1] * cc[t3];
                let ci4 = wa3[i - 2] * cc[t3] - wa3[i - 1] * cc[t3 - 1];

                let tr1 = cr2 + cr4;
                let tr4 = cr4 - cr2;
                let ti1 = ci2 + ci4;
                let ti4 = ci2 - ci4;
                let ti2 = cc[t2] + ci3;
                let ti3 = cc[t2] - ci3;
                let tr2 = cc[t2 - 1] + cr3;
                let tr3 = cc[t2 - 1] - cr3;

                ch[t4 - 1] = tr1 + tr2;
                ch[t4] = ti1 + ti2;
                ch[t5 - 1] = tr3 - ti4;
                ch[t5] = tr4 - ti3;
                ch[t4 + t6 - 1] = ti4 + tr3;
                ch[t4 + t6] = tr4 + ti3;
                ch[t5 + t6 - 1] = tr2 - tr1;
                ch[t5 + t6] = ti1 - ti2;
                i += 2;
            }
            t1 += ido;
        }

        if ido % 2 == 1 {
            return;
        }
    }

    let mut t1 = t0 + ido - 1;
    let mut t2 = t1 + (t0 << 1);
    let t3 = ido << 2;
    let mut t4 = ido;
    let t5 = ido << 1;
    let mut t6 = ido;

    for _ in 0..l1 {
        let ti1 = -HSQT2 * (cc[t1] + cc[t2]);
        let tr1 = HSQT2 * (cc[t1] - cc[t2]);
        ch[t4 - 1] = tr1 + cc[t6 - 1];
        ch[t4 + t5 - 1] = cc[t6 - 1] - tr1;
        ch[t4] = ti1 - cc[t1 + t0];
        ch[t4 + t5] = ti1 + cc[t1 + t0];
        t1 += ido;
        t2 += ido;
        t4 += t3;
        t6 += ido;
    }
}

fn radb4(
    ido: usize,
    l1: usize,
    cc: &[Sample],
    ch: &mut [Sample],
    wa1: &[Sample],
    wa2: &[Sample],
    wa3: &[Sample],
) {
    const SQRT2: Sample = std::f32::consts::SQRT_2;
    let t0 = l1 * ido;

    let mut t1 = 0usize;
    let t2 = ido << 2;
    let mut t3 = 0usize;
    let t6 = ido << 1;

    for _ in 0..l1 {
        let mut t4 = t3 + t6;
        let mut t5 = t1;
        let tr3 = cc[t4 - 1] + cc[t4 - 1];
        let tr4 = cc[t4] + cc[t4];
        t4 += t6;
        let tr1 = cc[t3] - cc[t4 - 1];
        let tr2 = cc[t3] + cc[t4 - 1];
        ch[t5] = tr2 + tr3;
        t5 += t0;
        ch[t5] = tr1 - tr4;
        t5 += t0;
        ch[t5] = tr2 - tr3;
        t5 += t0;
        ch[t5] = tr1 + tr4;
        t1 += ido;
        t3 += t2;
    }

    if ido < 2 {
        return;
    }

    if ido > 2 {
        let mut t1 = 0usize;
        for _ in 0..l1 {
            let mut t2 = t1 << 2;
            let mut t3 = t2 + t6;
            let mut t4 = t3 + t6;
            let mut t5 = t4;
            let mut t7 = t1;

            let mut i = 2;
            while i < ido {
                t2 += 2;
                t3 += 2;
                t4 -= 2;
                t5 -= 2;
                t7 += 2;
                let ti1 = cc[t2] + cc[t5];
                let ti2 = cc[t2] - cc[t5];
                let ti3 = cc[t3] - cc[t4];
                let tr4 = cc[t3] + cc[t4];
                let tr1 = cc[t2 - 1] - cc[t5 - 1];
                let tr2 = cc[t2 - 1] + cc[t5 - 1];
                let ti4 = cc[t3 - 1] - cc[t4 - 1];
                let tr3 = cc[t3 - 1] + cc[t4 - 1];
                ch[t7 - 1] = tr2 + tr3;
                let cr3 = tr2 - tr3;
                ch[t7] = ti2 + ti3;
                let ci3 = ti2 - ti3;
                let cr2 = tr1 - tr4;
                let cr4 = tr1 + tr4;
                let ci2 = ti1 + ti4;
                let ci4 = ti1 - ti4;

                let mut t8 = t7 + t0;
                ch[t8 - 1] = wa1[i - 2] * cr2 - wa1[i - 1] * ci2;
                ch[t8] = wa1[i - 2] * ci2 + wa1[i - 1] * cr2;
                t8 += t0;
                ch[t8 - 1] = wa2[i - 2] * cr3 - wa2[i - 1] * ci3;
                ch[t8] = wa2[i - 2] * ci3 + wa2[i - 1] * cr3;
                t8 += t0;
                ch[t8 - 1] = wa3[i - 2] * cr4 - wa3[i - 1] * ci4;
                ch[t8] = wa3[i - 2] * ci4 + wa3[i - 1] * cr4;
                i += 2;
            }
            t1 += ido;
        }

        if ido % 2 == 1 {
            return;
        }
    }

    let mut t1 = ido;
    let t2 = ido << 2;
    let mut t3 = ido - 1;
    let mut t4 = ido + (ido << 1);

    for _ in 0..l1 {
        let mut t5 = t3;
        let ti1 = cc[t1] + cc[t4];
        let ti2 = cc[t4] - cc[t1];
        let tr1 = cc[t1 - 1] - cc[t4 - 1];
        let tr2 = cc[t1 - 1] + cc[t4 - 1];
        ch[t5] = tr2 + tr2;
        t5 += t0;
        ch[t5] = SQRT2 * (tr1 - ti1);
        t5 += t0;
        ch[t5] = ti2 + ti2;
        t5 += t0;
        ch[t5] = -SQRT2 * (tr1 + ti1);

        t3 += ido;
        t1 += t2;
        t4 += t2;
    }
}

// ---------- General radix ----------
//
// `c` plays the cc/c1/c2 roles and `ch` the ch/ch2 roles of the classic
// routine; the pass drivers only ever call it with those pointers aliased,
// so the two-buffer form is the effective algorithm.

fn radfg(
    ido: usize,
    ip: usize,
    l1: usize,
    idl1: usize,
    c: &mut [Sample],
    ch: &mut [Sample],
    wa: &[Sample],
) {
    let arg = 2.0 * PI / ip as f64;
    let dcp = arg.cos() as Sample;
    let dsp = arg.sin() as Sample;
    let ipph = (ip + 1) >> 1;
    let ipp2 = ip;
    let idp2 = ido;
    let nbd = (ido - 1) >> 1;
    let t0 = l1 * ido;
    let t10 = ip * ido;

    if ido != 1 {
        ch[..idl1].copy_from_slice(&c[..idl1]);

        let mut t1 = 0usize;
        for _ in 1..ip {
            t1 += t0;
            let mut t2 = t1;
            for _ in 0..l1 {
                ch[t2] = c[t2];
                t2 += ido;
            }
        }

        let mut is = -(ido as isize);
        let mut t1 = 0usize;
        if nbd > l1 {
            for _ in 1..ip {
                t1 += t0;
                is += ido as isize;
                let mut t2 = t1 as isize - ido as isize;
                for _ in 0..l1 {
                    let mut idij = is - 1;
                    t2 += ido as isize;
                    let mut t3 = t2;
                    let mut i = 2;
                    while i < ido {
                        idij += 2;
                        t3 += 2;
                        let w0 = wa[(idij - 1) as usize];
                        let w1 = wa[idij as usize];
                        let u3 = t3 as usize;
                        ch[u3 - 1] = w0 * c[u3 - 1] + w1 * c[u3];
                        ch[u3] = w0 * c[u3] - w1 * c[u3 - 1];
                        i += 2;
                    }
                }
            }
        } else {
            for _ in 1..ip {
                is += ido as isize;
                let mut idij = is - 1;
                t1 += t0;
                let mut t2 = t1;
                let mut i = 2;
                while i < ido {
                    idij += 2;
                    t2 += 2;
                    let mut t3 = t2;
                    let w0 = wa[(idij - 1) as usize];
                    let w1 = wa[idij as usize];
                    for _ in 0..l1 {
                        ch[t3 - 1] = w0 * c[t3 - 1] + w1 * c[t3];
                        ch[t3] = w0 * c[t3] - w1 * c[t3 - 1];
                        t3 += ido;
                    }
                    i += 2;
                }
            }
        }

        let mut t1 = 0usize;
        let mut t2 = ipp2 * t0;
        if nbd < l1 {
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;
                let mut i = 2;
                while i < ido {
                    t3 += 2;
                    t4 += 2;
                    let mut t5 = t3 - ido;
                    let mut t6 = t4 - ido;
                    for _ in 0..l1 {
                        t5 += ido;
                        t6 += ido;
                        c[t5 - 1] = ch[t5 - 1] + ch[t6 - 1];
                        c[t6 - 1] = ch[t5] - ch[t6];
                        c[t5] = ch[t5] + ch[t6];
                        c[t6] = ch[t6 - 1] - ch[t5 - 1];
                    }
                    i += 2;
                }
            }
        } else {
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;
                for _ in 0..l1 {
                    let mut t5 = t3;
                    let mut t6 = t4;
                    let mut i = 2;
                    while i < ido {
                        t5 += 2;
                        t6 += 2;
                        c[t5 - 1] = ch[t5 - 1] + ch[t6 - 1];
                        c[t6 - 1] = ch[t5] - ch[t6];
                        c[t5] = ch[t5] + ch[t6];
                        c[t6] = ch[t6 - 1] - ch[t5 - 1];
                        i += 2;
                    }
                    t3 += ido;
                    t4 += ido;
                }
            }
        }
    }

    // L119
    c[..idl1].copy_from_slice(&ch[..idl1]);

    let mut t1 = 0usize;
    let mut t2 = ipp2 * idl1;
    for _ in 1..ipph {
        t1 += t0;
        t2 -= t0;
        let mut t3 = t1 - ido;
        let mut t4 = t2 - ido;
        for _ in 0..l1 {
            t3 += ido;
            t4 += ido;
            c[t3] = ch[t3] + ch[t4];
            c[t4] = ch[t4] - ch[t3];
        }
    }

    let mut ar1: Sample = 1.0;
    let mut ai1: Sample = 0.0;
    let mut t1 = 0usize;
    let mut t2 = ipp2 * idl1;
    let t3 = (ip - 1) * idl1;
    for _ in 1..ipph {
        t1 += idl1;
        t2 -= idl1;
        let ar1h = dcp * ar1 - dsp * ai1;
        ai1 = dcp * ai1 + dsp * ar1;
        ar1 = ar1h;
        let mut t4 = t1;
        let mut t5 = t2;
        let mut t6 = t3;
        let mut t7 = idl1;

        for ik in 0..idl1 {
            ch[t4] = c[ik] + ar1 * c[t7];
            t4 += 1;
            t7 += 1;
            ch[t5] = ai1 * c[t6];
            t5 += 1;
            t6 += 1;
        }

        let dc2 = ar1;
        let ds2 = ai1;
        let mut ar2 = ar1;
        let mut ai2 = ai1;

        let mut t4 = idl1;
        let mut t5 = (ipp2 - 1) * idl1;
        for _ in 2..ipph {
            t4 += idl1;
            t5 -= idl1;

            let ar2h = dc2 * ar2 - ds2 * ai2;
            ai2 = dc2 * ai2 + ds2 * ar2;
            ar2 = ar2h;

            let mut t6 = t1;
            let mut t7 = t2;
            let mut t8 = t4;
            let mut t9 = t5;
            for _ in 0..idl1 {
                ch[t6] += ar2 * c[t8];
                t6 += 1;
                t8 += 1;
                ch[t7] += ai2 * c[t9];
                t7 += 1;
                t9 += 1;
            }
        }
    }

    let mut t1 = 0usize;
    for _ in 1..ipph {
        t1 += idl1;
        let mut t2 = t1;
        for ik in 0..idl1 {
            ch[ik] += c[t2];
            t2 += 1;
        }
    }

    if ido >= l1 {
        let mut t1 = 0usize;
        let mut t2 = 0usize;
        for _ in 0..l1 {
            let mut t3 = t1;
            let mut t4 = t2;
            for _ in 0..ido {
                c[t4] = ch[t3];
                t3 += 1;
                t4 += 1;
            }
            t1 += ido;
            t2 += t10;
        }
    } else {
        for i in 0..ido {
            let mut t1 = i;
            let mut t2 = i;
            for _ in 0..l1 {
                c[t2] = ch[t1];
                t1 += ido;
                t2 += t10;
            }
        }
    }

    // L135
    let mut t1 = 0usize;
    let t2 = ido << 1;
    let mut t3 = 0usize;
    let mut t4 = ipp2 * t0;
    for _ in 1..ipph {
        t1 += t2;
        t3 += t0;
        t4 -= t0;

        let mut t5 = t1;
        let mut t6 = t3;
        let mut t7 = t4;

        for _ in 0..l1 {
            c[t5 - 1] = ch[t6];
            c[t5] = ch[t7];
            t5 += t10;
            t6 += ido;
            t7 += ido;
        }
    }

    if ido == 1 {
        return;
    }

    if nbd >= l1 {
        let mut t1 = -(ido as isize);
        let mut t3 = 0usize;
        let mut t4 = 0usize;
        let mut t5 = ipp2 * t0;
        for _ in 1..ipph {
            t1 += t2 as isize;
            t3 += t2;
            t4 += t0;
            t5 -= t0;
            let mut t6 = t1;
            let mut t7 = t3;
            let mut t8 = t4;
            let mut t9 = t5;
            for _ in 0..l1 {
                let mut i = 2;
                while i < ido {
                    let ic = idp2 - i;
                    c[i + t7 - 1] = ch[i + t8 - 1] + ch[i + t9 - 1];
                    c[(ic as isize + t6 - 1) as usize] = ch[i + t8 - 1] - ch[i + t9 - 1];
                    c[i + t7] = ch[i + t8] + ch[i + t9];
                    c[(ic as isize + t6) as usize] = ch[i + t9] - ch[i + t8];
                    i += 2;
                }
                t6 += t10 as isize;
                t7 += t10;
                t8 += ido;
                t9 += ido;
            }
        }
        return;
    }

    // L141
    let mut t1 = -(ido as isize);
    let mut t3 = 0usize;
    let mut t4 = 0usize;
    let mut t5 = ipp2 * t0;
    for _ in 1..ipph {
        t1 += t2 as isize;
        t3 += t2;
        t4 += t0;
        t5 -= t0;
        let mut i = 2;
        while i < ido {
            let mut t6 = idp2 as isize + t1 - i as isize;
            let mut t7 = i + t3;
            let mut t8 = i + t4;
            let mut t9 = i + t5;
            for _ in 0..l1 {
                c[t7 - 1] = ch[t8 - 1] + ch[t9 - 1];
                c[(t6 - 1) as usize] = ch[t8 - 1] - ch[t9 - 1];
                c[t7] = ch[t8] + ch[t9];
                c[t6 as usize] = ch[t9] - ch[t8];
                t6 += t10 as isize;
                t7 += t10;
                t8 += ido;
                t9 += ido;
            }
            i += 2;
        }
    }
}

fn radbg(
    ido: usize,
    ip: usize,
    l1: usize,
    idl1: usize,
    c: &mut [Sample],
    ch: &mut [Sample],
    wa: &[Sample],
) {
    let t10 = ip * ido;
    let t0 = l1 * ido;
    let arg = 2.0 * PI / ip as f64;
    let dcp = arg.cos() as Sample;
    let dsp = arg.sin() as Sample;
    let nbd = (ido - 1) >> 1;
    let ipp2 = ip;
    let ipph = (ip + 1) >> 1;

    if ido >= l1 {
        let mut t1 = 0usize;
        let mut t2 = 0usize;
        for _ in 0..l1 {
            let mut t3 = t1;
            let mut t4 = t2;
            for _ in 0..ido {
                ch[t3] = c[t4];
                t3 += 1;
                t4 += 1;
            }
            t1 += ido;
            t2 += t10;
        }
    } else {
        // L103
        for i in 0..ido {
            let mut t2 = i;
            let mut t3 = i;
            for _ in 0..l1 {
                ch[t2] = c[t3];
                t2 += ido;
                t3 += t10;
            }
        }
    }

    // L106
    let mut t1 = 0usize;
    let mut t2 = ipp2 * t0;
    let mut t5 = ido << 1;
    let t7 = t5;
    for _ in 1..ipph {
        t1 += t0;
        t2 -= t0;
        let mut t3 = t1;
        let mut t4 = t2;
        let mut t6 = t5;
        for _ in 0..l1 {
            ch[t3] = c[t6 - 1] + c[t6 - 1];
            ch[t4] = c[t6] + c[t6];
            t3 += ido;
            t4 += ido;
            t6 += t10;
        }
        t5 += t7;
    }

    if ido != 1 {
        if nbd >= l1 {
            let mut t1 = 0usize;
            let mut t2 = ipp2 * t0;
            let mut t7 = 0usize;
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;

                t7 += ido << 1;
                let mut t8 = t7;
                for _ in 0..l1 {
                    let mut t5 = t3;
                    let mut t6 = t4;
                    let mut t9 = t8;
                    let mut t11 = t8;
                    let mut i = 2;
                    while i < ido {
                        t5 += 2;
                        t6 += 2;
                        t9 += 2;
                        t11 -= 2;
                        ch[t5 - 1] = c[t9 - 1] + c[t11 - 1];
                        ch[t6 - 1] = c[t9 - 1] - c[t11 - 1];
                        ch[t5] = c[t9] - c[t11];
                        ch[t6] = c[t9] + c[t11];
                        i += 2;
                    }
                    t3 += ido;
                    t4 += ido;
                    t8 += t10;
                }
            }
        } else {
            // L112
            let mut t1 = 0usize;
            let mut t2 = ipp2 * t0;
            let mut t7 = 0usize;
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;
                t7 += ido << 1;
                let mut t8 = t7;
                let mut t9 = t7;
                let mut i = 2;
                while i < ido {
                    t3 += 2;
                    t4 += 2;
                    t8 += 2;
                    t9 -= 2;
                    let mut t5 = t3;
                    let mut t6 = t4;
                    let mut t11 = t8;
                    let mut t12 = t9;
                    for _ in 0..l1 {
                        ch[t5 - 1] = c[t11 - 1] + c[t12 - 1];
                        ch[t6 - 1] = c[t11 - 1] - c[t12 - 1];
                        ch[t5] = c[t11] - c[t12];
                        ch[t6] = c[t11] + c[t12];
                        t5 += ido;
                        t6 += ido;
                        t11 += t10;
                        t12 += t10;
                    }
                    i += 2;
                }
            }
        }
    }

    // L116
    let mut ar1: Sample = 1.0;
    let mut ai1: Sample = 0.0;
    let mut t1 = 0usize;
    let t9 = ipp2 * idl1;
    let mut t2 = t9;
    let t3 = (ip - 1) * idl1;
    for _ in 1..ipph {
        t1 += idl1;
        t2 -= idl1;

        let ar1h = dcp * ar1 - dsp * ai1;
        ai1 = dcp * ai1 + dsp * ar1;
        ar1 = ar1h;
        let mut t4 = t1;
        let mut t5 = t2;
        let mut t6 = 0usize;
        let mut t7 = idl1;
        let mut t8 = t3;
        for _ in 0..idl1 {
            c[t4] = ch[t6] + ar1 * ch[t7];
            t4 += 1;
            t6 += 1;
            t7 += 1;
            c[t5] = ai1 * ch[t8];
            t5 += 1;
            t8 += 1;
        }
        let dc2 = ar1;
        let ds2 = ai1;
        let mut ar2 = ar1;
        let mut ai2 = ai1;

        let mut t6 = idl1;
        let mut t7 = t9 - idl1;
        for _ in 2..ipph {
            t6 += idl1;
            t7 -= idl1;
            let ar2h = dc2 * ar2 - ds2 * ai2;
            ai2 = dc2 * ai2 + ds2 * ar2;
            ar2 = ar2h;
            let mut t4 = t1;
            let mut t5 = t2;
            let mut t11 = t6;
            let mut t12 = t7;
            for _ in 0..idl1 {
                c[t4] += ar2 * ch[t11];
                t4 += 1;
                t11 += 1;
                c[t5] += ai2 * ch[t12];
                t5 += 1;
                t12 += 1;
            }
        }
    }

    let mut t1 = 0usize;
    for _ in 1..ipph {
        t1 += idl1;
        let mut t2 = t1;
        for ik in 0..idl1 {
            ch[ik] += ch[t2];
            t2 += 1;
        }
    }

    let mut t1 = 0usize;
    let mut t2 = ipp2 * t0;
    for _ in 1..ipph {
        t1 += t0;
        t2 -= t0;
        let mut t3 = t1;
        let mut t4 = t2;
        for _ in 0..l1 {
            ch[t3] = c[t3] - c[t4];
            ch[t4] = c[t3] + c[t4];
            t3 += ido;
            t4 += ido;
        }
    }

    if ido != 1 {
        if nbd >= l1 {
            let mut t1 = 0usize;
            let mut t2 = ipp2 * t0;
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;
                for _ in 0..l1 {
                    let mut t5 = t3;
                    let mut t6 = t4;
                    let mut i = 2;
                    while i < ido {
                        t5 += 2;
                        t6 += 2;
                        ch[t5 - 1] = c[t5 - 1] - c[t6];
                        ch[t6 - 1] = c[t5 - 1] + c[t6];
                        ch[t5] = c[t5] + c[t6 - 1];
                        ch[t6] = c[t5] - c[t6 - 1];
                        i += 2;
                    }
                    t3 += ido;
                    t4 += ido;
                }
            }
        } else {
            // L128
            let mut t1 = 0usize;
            let mut t2 = ipp2 * t0;
            for _ in 1..ipph {
                t1 += t0;
                t2 -= t0;
                let mut t3 = t1;
                let mut t4 = t2;
                let mut i = 2;
                while i < ido {
                    t3 += 2;
                    t4 += 2;
                    let mut t5 = t3;
                    let mut t6 = t4;
                    for _ in 0..l1 {
                        ch[t5 - 1] = c[t5 - 1] - c[t6];
                        ch[t6 - 1] = c[t5 - 1] + c[t6];
                        ch[t5] = c[t5] + c[t6 - 1];
                        ch[t6] = c[t5] - c[t6 - 1];
                        t5 += ido;
                        t6 += ido;
                    }
                    i += 2;
                }
            }
        }
    }

    // L132
    if ido == 1 {
        return;
    }

    c[..idl1].copy_from_slice(&ch[..idl1]);

    let mut t1 = 0usize;
    for _ in 1..ip {
        t1 += t0;
        let mut t2 = t1;
        for _ in 0..l1 {
            c[t2] = ch[t2];
            t2 += ido;
        }
    }

    if nbd <= l1 {
        let mut is = -(ido as isize) - 1;
        let mut t1 = 0usize;
        for _ in 1..ip {
            is += ido as isize;
            t1 += t0;
            let mut idij = is;
            let mut t2 = t1;
            let mut i = 2;
            while i < ido {
                t2 += 2;
                idij += 2;
                let mut t3 = t2;
                let w0 = wa[(idij - 1) as usize];
                let w1 = wa[idij as usize];
                for _ in 0..l1 {
                    c[t3 - 1] = w0 * ch[t3 - 1] - w1 * ch[t3];
                    c[t3] = w0 * ch[t3] + w1 * ch[t3 - 1];
                    t3 += ido;
                }
                i += 2;
            }
        }
        return;
    }

    // L139
    let mut is = -(ido as isize) - 1;
    let mut t1 = 0usize;
    for _ in 1..ip {
        is += ido as isize;
        t1 += t0;
        let mut t2 = t1;
        for _ in 0..l1 {
            let mut idij = is;
            let mut t3 = t2;
            let mut i = 2;
            while i < ido {
                idij += 2;
                t3 += 2;
                let w0 = wa[(idij - 1) as usize];
                let w1 = wa[idij as usize];
                c[t3 - 1] = w0 * ch[t3 - 1] - w1 * ch[t3];
                c[t3] = w0 * ch[t3] + w1 * ch[t3 - 1];
                i += 2;
            }
            t2 += ido;
        }
    }
}
