//! Coefficient table for Verner's "most efficient" embedded 7(6) Runge-Kutta
//! pair.
//!
//! Ten-stage core: nodes `C`, coupling coefficients `A` (strictly lower
//! triangular), seventh-order weights `B`, and sixth-order embedded weights
//! `BH`. The local error estimate of a step of size `h` is
//! `h · Σ_i (B[i] − BH[i]) k_i`.
//!
//! Values from <https://www.sfu.ca/~jverner/>
//! (RKV76.IIa.Efficient.00001675585.081206).

/// Number of stages.
pub const NSTAGE: usize = 10;

/// Stage nodes.
pub const C: [f64; NSTAGE] = [
    0.0,
    0.005,
    0.1088888888888888888888888888888888888889,
    0.1633333333333333333333333333333333333333,
    0.4555,
    0.6095094489978381317087004421486024949638,
    0.884,
    0.925,
    1.0,
    1.0,
];

/// Stage coupling coefficients; `A[i][j]` weights stage `j` in the
/// evaluation point of stage `i`.
pub const A: [[f64; NSTAGE]; NSTAGE] = [
    [0.0; NSTAGE],
    [
        0.005,
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ],
    [
        -1.076790123456790123456790123456790123457,
        1.185679012345679012345679012345679012346,
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ],
    [
        0.04083333333333333333333333333333333333333,
        0.0,
        0.1225,
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ],
    [
        0.6389139236255726780508121615993336109954,
        0.0,
        -2.455672638223656809662640566430653894211,
        2.272258714598084131611828404831320283215,
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ],
    [
        -2.661577375018757131119259297861818119279,
        0.0,
        10.80451388645613769565396655365532838482,
        -8.353914657396199411968048547819291691541,
        0.8204875949566569791420417341743839209619,
        0.0, 0.0, 0.0, 0.0, 0.0,
    ],
    [
        6.067741434696770992718360183877276714679,
        0.0,
        -24.71127363591108579734203485290746001803,
        20.42751793078889394045773111748346612697,
        -1.906157978816647150624096784352757010879,
        1.006172249242068014790040335899474187268,
        0.0, 0.0, 0.0, 0.0,
    ],
    [
        12.05467007625320299509109452892778311648,
        0.0,
        -49.75478495046898932807257615331444758322,
        41.14288863860467663259698416710157354209,
        -4.461760149974004185641911603484815375051,
        2.042334822239174959821717077708608543738,
        -0.09834843665406107379530801693870224403537,
        0.0, 0.0, 0.0,
    ],
    [
        10.13814652288180787641845141981689030769,
        0.0,
        -42.64113603171750214622846006736635730625,
        35.76384003992257007135021178023160054034,
        -4.348022840392907653340370296908245943710,
        2.009862268377035895441943593011827554771,
        0.3487490460338272405953822853053145879140,
        -0.2714390051048312842371587140910297407572,
        0.0, 0.0,
    ],
    [
        -45.03007203429867712435322405073769635151,
        0.0,
        187.3272437654588840752418206154201997384,
        -154.0288236935018690596728621034510402582,
        18.56465306347536233859492332958439136765,
        -7.141809679295078854925420496823551192821,
        1.308808578161378625114762706007696696508,
        0.0,
        0.0,
        0.0,
    ],
];

/// Seventh-order solution weights.
pub const B: [f64; NSTAGE] = [
    0.04715561848627222170431765108838175679569,
    0.0,
    0.0,
    0.2575056429843415189596436101037687580986,
    0.2621665397741262047713863095764527711129,
    0.1521609265673855740323133199165117535523,
    0.4939969170032484246907175893227876844296,
    -0.2943031171403250441557244744092703429139,
    0.08131747232495109999734599440136761892478,
    0.0,
];

/// Sixth-order embedded weights.
pub const BH: [f64; NSTAGE] = [
    0.04460860660634117628731817597479197781432,
    0.0,
    0.0,
    0.2671640378571372680509102260943837899738,
    0.2201018300177293019979715776650753096323,
    0.2188431703143156830983120833512893824578,
    0.2289871705411202883378173889763552365362,
    0.0,
    0.0,
    0.02029518466335628222767054793810430358554,
];
